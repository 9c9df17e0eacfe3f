//! The externally stored per-user presence record and its partial update.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;

/// The presence document stored per user in the user-record store.
///
/// The presence fields (`is_online`, `last_seen`, `last_heartbeat`) are
/// written only by that user's own presence agent, so the record is
/// single-writer, multi-reader. The profile fields (`display_name`,
/// `photo_url`) are denormalized for display and never written by the
/// presence engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPresenceRecord {
    /// The user this record belongs to.
    pub user_id: UserId,
    /// Display name, denormalized from the user profile.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Avatar URL, denormalized from the user profile.
    #[serde(default)]
    pub photo_url: Option<String>,
    /// The user's *self-reported* online flag.
    #[serde(default)]
    pub is_online: bool,
    /// Most recent transition to offline, or last known activity.
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    /// Updated periodically while the owning agent believes itself online.
    /// A stale value here is the sole signal that `is_online` is no longer
    /// trustworthy.
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl UserPresenceRecord {
    /// A fresh record for a user that has never been online.
    pub fn offline(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
            photo_url: None,
            is_online: false,
            last_seen: None,
            last_heartbeat: None,
        }
    }

    /// The derived online verdict: self-reported online AND a heartbeat
    /// younger than `stale_threshold`.
    ///
    /// This derived value, not the raw flag, is what the rest of the
    /// system treats as ground truth. A crashed tab leaves `is_online:
    /// true` behind forever; only this check reclaims that state as
    /// offline. A heartbeat from the future (writer/reader clock skew)
    /// counts as fresh.
    pub fn is_effectively_online(
        &self,
        now: DateTime<Utc>,
        stale_threshold: chrono::Duration,
    ) -> bool {
        if !self.is_online {
            return false;
        }
        match self.last_heartbeat {
            Some(heartbeat) => now.signed_duration_since(heartbeat) < stale_threshold,
            // Online flag without any heartbeat: malformed, treat as stale.
            None => false,
        }
    }
}

/// Partial update for a [`UserPresenceRecord`].
///
/// Only set fields are applied; the store must not require a
/// read-modify-write cycle. Writes are idempotent per-field
/// last-write-wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresencePatch {
    /// New value for the self-reported online flag, if any.
    pub is_online: Option<bool>,
    /// New value for the last-seen timestamp, if any.
    pub last_seen: Option<DateTime<Utc>>,
    /// New value for the heartbeat timestamp, if any.
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl PresencePatch {
    /// The patch written when an agent comes online.
    pub fn online(now: DateTime<Utc>) -> Self {
        Self {
            is_online: Some(true),
            last_seen: Some(now),
            last_heartbeat: Some(now),
        }
    }

    /// The patch written when an agent goes offline.
    pub fn offline(now: DateTime<Utc>) -> Self {
        Self {
            is_online: Some(false),
            last_seen: Some(now),
            last_heartbeat: None,
        }
    }

    /// The periodic heartbeat patch.
    pub fn heartbeat(now: DateTime<Utc>) -> Self {
        Self {
            is_online: None,
            last_seen: None,
            last_heartbeat: Some(now),
        }
    }

    /// Apply the set fields onto a record, leaving the rest untouched.
    pub fn apply_to(&self, record: &mut UserPresenceRecord) {
        if let Some(is_online) = self.is_online {
            record.is_online = is_online;
        }
        if let Some(last_seen) = self.last_seen {
            record.last_seen = Some(last_seen);
        }
        if let Some(last_heartbeat) = self.last_heartbeat {
            record.last_heartbeat = Some(last_heartbeat);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online_record(heartbeat_age_seconds: i64) -> UserPresenceRecord {
        let now = Utc::now();
        UserPresenceRecord {
            is_online: true,
            last_seen: Some(now),
            last_heartbeat: Some(now - chrono::Duration::seconds(heartbeat_age_seconds)),
            ..UserPresenceRecord::offline(UserId::new())
        }
    }

    #[test]
    fn test_fresh_heartbeat_is_online() {
        let record = online_record(119);
        assert!(record.is_effectively_online(Utc::now(), chrono::Duration::seconds(120)));
    }

    #[test]
    fn test_stale_heartbeat_is_reclaimed_offline() {
        let record = online_record(121);
        assert!(!record.is_effectively_online(Utc::now(), chrono::Duration::seconds(120)));
    }

    #[test]
    fn test_raw_flag_false_wins_over_fresh_heartbeat() {
        let mut record = online_record(1);
        record.is_online = false;
        assert!(!record.is_effectively_online(Utc::now(), chrono::Duration::seconds(120)));
    }

    #[test]
    fn test_missing_heartbeat_counts_as_stale() {
        let mut record = online_record(0);
        record.last_heartbeat = None;
        assert!(!record.is_effectively_online(Utc::now(), chrono::Duration::seconds(120)));
    }

    #[test]
    fn test_future_heartbeat_counts_as_fresh() {
        // Writer clock ahead of reader clock must not flap the user offline.
        let record = online_record(-30);
        assert!(record.is_effectively_online(Utc::now(), chrono::Duration::seconds(120)));
    }

    #[test]
    fn test_patch_applies_only_set_fields() {
        let mut record = online_record(0);
        record.display_name = Some("Mika".to_string());
        let before_seen = record.last_seen;

        PresencePatch::heartbeat(Utc::now()).apply_to(&mut record);

        assert!(record.is_online);
        assert_eq!(record.last_seen, before_seen);
        assert_eq!(record.display_name.as_deref(), Some("Mika"));
    }

    #[test]
    fn test_offline_patch_keeps_heartbeat_untouched() {
        let mut record = online_record(5);
        let heartbeat = record.last_heartbeat;

        PresencePatch::offline(Utc::now()).apply_to(&mut record);

        assert!(!record.is_online);
        assert!(record.last_seen.is_some());
        assert_eq!(record.last_heartbeat, heartbeat);
    }
}
