//! Per-club presence observers.

mod poll;

use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use clubpulse_core::config::presence::PresenceConfig;
use clubpulse_core::traits::UserRecordStore;
use clubpulse_core::types::{ClubId, MemberPresenceView, UserId};

use crate::metrics::PresenceMetrics;

use poll::{run_poll_loop, ClubTicks};

/// Invoked with the full derived member list on every successful poll
/// tick of a watched club.
pub type ObserverCallback = Arc<dyn Fn(ClubId, Vec<MemberPresenceView>) + Send + Sync>;

/// Cancels the watch's poll loop when removed from the watch map.
#[derive(Debug)]
struct WatchHandle {
    token: CancellationToken,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Watches clubs by polling member records and deriving who is online
/// through the heartbeat staleness rule.
///
/// One watch per club: watching a club that is already watched replaces
/// the existing poll loop instead of stacking a second one, so repeated
/// subscriptions are idempotent rather than a leak.
pub struct PresenceObserver {
    store: Arc<dyn UserRecordStore>,
    config: PresenceConfig,
    metrics: Arc<PresenceMetrics>,
    watches: DashMap<ClubId, WatchHandle>,
    /// Tick sequencing per club, kept across re-watches so results from
    /// a replaced loop cannot overwrite the replacement's.
    ticks: DashMap<ClubId, Arc<ClubTicks>>,
}

impl std::fmt::Debug for PresenceObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceObserver")
            .field("watched_clubs", &self.watches.len())
            .finish()
    }
}

impl PresenceObserver {
    pub fn new(
        store: Arc<dyn UserRecordStore>,
        config: PresenceConfig,
        metrics: Arc<PresenceMetrics>,
    ) -> Self {
        Self {
            store,
            config,
            metrics,
            watches: DashMap::new(),
            ticks: DashMap::new(),
        }
    }

    /// Start (or restart) polling a club's roster.
    ///
    /// The member list is fixed for the lifetime of the watch; callers
    /// re-invoke `watch` with a fresh roster when membership changes.
    /// The first poll fires immediately, so the initial "who is already
    /// online" view arrives without waiting a full interval.
    pub fn watch(&self, club_id: ClubId, member_ids: Vec<UserId>, callback: ObserverCallback) {
        let token = CancellationToken::new();
        let ticks = self
            .ticks
            .entry(club_id)
            .or_insert_with(|| Arc::new(ClubTicks::default()))
            .clone();

        // Inserting drops any previous handle, cancelling the loop it
        // owned before the replacement starts polling.
        self.watches
            .insert(club_id, WatchHandle { token: token.clone() });

        info!(club_id = %club_id, members = member_ids.len(), "Watching club presence");
        tokio::spawn(run_poll_loop(
            club_id,
            member_ids,
            self.store.clone(),
            self.config.clone(),
            ticks,
            token,
            self.metrics.clone(),
            callback,
        ));
    }

    /// Stop polling a club. No-op for clubs that are not watched.
    pub fn unwatch(&self, club_id: ClubId) {
        if self.watches.remove(&club_id).is_some() {
            self.ticks.remove(&club_id);
            debug!(club_id = %club_id, "Unwatched club presence");
        }
    }

    /// Stop every active watch.
    pub fn unwatch_all(&self) {
        let count = self.watches.len();
        self.watches.clear();
        self.ticks.clear();
        if count > 0 {
            debug!(watches = count, "Stopped all club watches");
        }
    }

    pub fn is_watching(&self, club_id: ClubId) -> bool {
        self.watches.contains_key(&club_id)
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }
}

impl Drop for PresenceObserver {
    fn drop(&mut self) {
        // WatchHandle drops cancel the loops; nothing polls past the
        // owning session's lifetime.
        self.watches.clear();
    }
}
