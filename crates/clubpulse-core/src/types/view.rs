//! Derived, display-ready presence view of a single member.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::UserId;
use super::record::UserPresenceRecord;

/// What an observer reports for one member after applying the staleness
/// rule.
///
/// `is_online` here is always the *derived* verdict, never the raw
/// stored flag. Consumers (roster UI, aggregator snapshots) only ever
/// see this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberPresenceView {
    /// The member this view describes.
    pub user_id: UserId,
    /// Display name from the stored record, if the profile was populated.
    pub display_name: Option<String>,
    /// Avatar URL from the stored record.
    pub photo_url: Option<String>,
    /// Derived online verdict (raw flag AND fresh heartbeat).
    pub is_online: bool,
    /// Last activity timestamp, passed through for "last seen" rendering.
    pub last_seen: Option<DateTime<Utc>>,
}

impl MemberPresenceView {
    /// Derive the view from a stored record at a given instant.
    pub fn from_record(
        record: &UserPresenceRecord,
        now: DateTime<Utc>,
        stale_threshold: chrono::Duration,
    ) -> Self {
        Self {
            user_id: record.user_id,
            display_name: record.display_name.clone(),
            photo_url: record.photo_url.clone(),
            is_online: record.is_effectively_online(now, stale_threshold),
            last_seen: record.last_seen,
        }
    }

    /// The view for a member with no stored record at all: offline with
    /// nothing known about them.
    pub fn missing(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
            photo_url: None,
            is_online: false,
            last_seen: None,
        }
    }
}
