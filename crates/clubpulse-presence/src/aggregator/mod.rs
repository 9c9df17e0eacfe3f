//! Presence aggregation: per-club snapshots, lookups, transition events.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use clubpulse_core::traits::NotificationSink;
use clubpulse_core::types::{
    diff_online_transitions, ClubId, ClubPresenceSnapshot, MemberPresenceView, UserId,
};

use crate::metrics::PresenceMetrics;

/// Process-level counts over everything the aggregator tracks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceStats {
    /// Clubs registered for tracking
    pub clubs_tracked: usize,
    /// Roster entries across all club snapshots
    pub members_tracked: usize,
    /// Members currently derived online across all club snapshots
    pub total_online: usize,
}

/// Owns the `club → snapshot` map, answers synchronous presence
/// lookups, and turns observer updates into transition events for the
/// notification sink.
///
/// Lookups never fail: unknown clubs answer with empty lists, zero
/// counts and `false`. The local user is excluded from emitted events
/// (nobody is notified about themself) but still appears in lookups.
pub struct PresenceAggregator {
    local_user_id: UserId,
    snapshots: DashMap<ClubId, ClubPresenceSnapshot>,
    club_names: DashMap<ClubId, String>,
    sink: Arc<dyn NotificationSink>,
    metrics: Arc<PresenceMetrics>,
}

impl std::fmt::Debug for PresenceAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceAggregator")
            .field("local_user_id", &self.local_user_id)
            .field("clubs_tracked", &self.club_names.len())
            .finish()
    }
}

impl PresenceAggregator {
    pub fn new(
        local_user_id: UserId,
        sink: Arc<dyn NotificationSink>,
        metrics: Arc<PresenceMetrics>,
    ) -> Self {
        Self {
            local_user_id,
            snapshots: DashMap::new(),
            club_names: DashMap::new(),
            sink,
            metrics,
        }
    }

    /// Register a club for tracking. Updates for unregistered clubs are
    /// dropped, so registration must precede the observer watch.
    pub fn register_club(&self, club_id: ClubId, club_name: impl Into<String>) {
        self.club_names.insert(club_id, club_name.into());
    }

    /// Human-readable name of a tracked club.
    pub fn club_name(&self, club_id: ClubId) -> Option<String> {
        self.club_names.get(&club_id).map(|name| name.clone())
    }

    /// Replace a club's snapshot with freshly derived views, emitting
    /// one transition event per member whose derived state changed.
    ///
    /// The first update after registration has no previous snapshot:
    /// every online member yields an ONLINE event (the initial "who is
    /// already here" burst, staggered downstream by the sink's pacing).
    pub fn on_observer_update(&self, club_id: ClubId, members: Vec<MemberPresenceView>) {
        let Some(club_name) = self.club_name(club_id) else {
            debug!(club_id = %club_id, "Dropping presence update for untracked club");
            return;
        };

        let next = ClubPresenceSnapshot::new(club_id, club_name.clone(), members, Utc::now());
        let events = match self.snapshots.entry(club_id) {
            Entry::Occupied(mut occupied) => {
                let events =
                    diff_online_transitions(Some(occupied.get()), &next, self.local_user_id);
                occupied.insert(next);
                events
            }
            Entry::Vacant(vacant) => {
                let events = diff_online_transitions(None, &next, self.local_user_id);
                vacant.insert(next);
                events
            }
        };

        for event in events {
            self.metrics.transitions_emitted.fetch_add(1, Ordering::Relaxed);
            debug!(
                user_id = %event.user_id,
                club_id = %event.club_id,
                kind = %event.kind,
                "Presence transition"
            );
            self.sink.enqueue(event.into_toast(club_name.clone()));
        }
    }

    /// Members currently derived online. Empty for unknown clubs.
    pub fn online_members(&self, club_id: ClubId) -> Vec<MemberPresenceView> {
        self.snapshots
            .get(&club_id)
            .map(|snapshot| snapshot.online_members())
            .unwrap_or_default()
    }

    /// Every member view from the last snapshot. Empty for unknown clubs.
    pub fn all_members(&self, club_id: ClubId) -> Vec<MemberPresenceView> {
        self.snapshots
            .get(&club_id)
            .map(|snapshot| snapshot.members.clone())
            .unwrap_or_default()
    }

    /// Count of members currently derived online. Zero for unknown clubs.
    pub fn online_count(&self, club_id: ClubId) -> usize {
        self.snapshots
            .get(&club_id)
            .map(|snapshot| snapshot.online_count())
            .unwrap_or(0)
    }

    /// Derived online state of one member. False for unknown clubs and
    /// unknown members.
    pub fn is_online(&self, club_id: ClubId, user_id: UserId) -> bool {
        self.snapshots
            .get(&club_id)
            .map(|snapshot| snapshot.is_online(user_id))
            .unwrap_or(false)
    }

    pub fn stats(&self) -> PresenceStats {
        let mut members_tracked = 0;
        let mut total_online = 0;
        for snapshot in self.snapshots.iter() {
            members_tracked += snapshot.members.len();
            total_online += snapshot.online_count();
        }
        PresenceStats {
            clubs_tracked: self.club_names.len(),
            members_tracked,
            total_online,
        }
    }

    /// Drop a club's snapshot and registration (untrack).
    pub fn remove_club(&self, club_id: ClubId) {
        self.club_names.remove(&club_id);
        self.snapshots.remove(&club_id);
    }

    /// Drop everything (session teardown).
    pub fn clear(&self) {
        self.club_names.clear();
        self.snapshots.clear();
    }
}
