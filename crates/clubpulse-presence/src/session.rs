//! Session-scoped presence engine for one authenticated user.

use std::sync::Arc;

use tracing::{info, warn};

use clubpulse_core::config::presence::PresenceConfig;
use clubpulse_core::traits::{ClubMembershipDirectory, NotificationSink, UserRecordStore};
use clubpulse_core::types::{ClubId, MemberPresenceView, UserId};

use crate::agent::PresenceAgent;
use crate::aggregator::{PresenceAggregator, PresenceStats};
use crate::metrics::{PresenceMetrics, PresenceMetricsSnapshot};
use crate::notify::{PacedNotifier, ToastPresenter};
use crate::observer::{ObserverCallback, PresenceObserver};

/// Ties the presence subsystems together for one login session: the
/// local user's agent, one observer per tracked club, the aggregator
/// they feed, and the notification pipeline.
///
/// There is deliberately no process-global instance. A session is
/// created at login, passed around by reference (or cheaply via `Arc`),
/// and torn down at logout; separate sessions are fully isolated, so
/// several can coexist in one process.
pub struct PresenceSession {
    user_id: UserId,
    directory: Arc<dyn ClubMembershipDirectory>,
    agent: PresenceAgent,
    observer: PresenceObserver,
    /// Shared with observer callbacks, which outlive individual watches.
    aggregator: Arc<PresenceAggregator>,
    /// Present when the session built its own paced sink; external
    /// sinks manage their own lifecycle.
    notifier: Option<Arc<PacedNotifier>>,
    metrics: Arc<PresenceMetrics>,
}

impl std::fmt::Debug for PresenceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceSession")
            .field("user_id", &self.user_id)
            .finish()
    }
}

impl PresenceSession {
    /// Create a session whose toasts go through a [`PacedNotifier`] to
    /// the given presenter. Must be called within a tokio runtime.
    pub fn new(
        user_id: UserId,
        config: PresenceConfig,
        store: Arc<dyn UserRecordStore>,
        directory: Arc<dyn ClubMembershipDirectory>,
        presenter: Arc<dyn ToastPresenter>,
    ) -> Self {
        let metrics = Arc::new(PresenceMetrics::new());
        let notifier = Arc::new(PacedNotifier::new(
            presenter,
            config.notification_pacing(),
            metrics.clone(),
        ));
        Self::build(
            user_id,
            config,
            store,
            directory,
            notifier.clone(),
            Some(notifier),
            metrics,
        )
    }

    /// Create a session with a caller-supplied sink, bypassing the
    /// built-in pacing queue.
    pub fn with_sink(
        user_id: UserId,
        config: PresenceConfig,
        store: Arc<dyn UserRecordStore>,
        directory: Arc<dyn ClubMembershipDirectory>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let metrics = Arc::new(PresenceMetrics::new());
        Self::build(user_id, config, store, directory, sink, None, metrics)
    }

    fn build(
        user_id: UserId,
        config: PresenceConfig,
        store: Arc<dyn UserRecordStore>,
        directory: Arc<dyn ClubMembershipDirectory>,
        sink: Arc<dyn NotificationSink>,
        notifier: Option<Arc<PacedNotifier>>,
        metrics: Arc<PresenceMetrics>,
    ) -> Self {
        let agent = PresenceAgent::new(user_id, store.clone(), config.clone(), metrics.clone());
        let observer = PresenceObserver::new(store, config, metrics.clone());
        let aggregator = Arc::new(PresenceAggregator::new(user_id, sink, metrics.clone()));

        info!(user_id = %user_id, "Presence session initialized");

        Self {
            user_id,
            directory,
            agent,
            observer,
            aggregator,
            notifier,
            metrics,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Mark the local user online and start heartbeating.
    pub async fn start(&self) {
        self.agent.start().await;
    }

    /// Start tracking a club: enumerate its members, register it with
    /// the aggregator, and watch it.
    ///
    /// Tracking an already-tracked club re-subscribes idempotently: the
    /// poll loop is replaced, the aggregator snapshot is kept, so no
    /// duplicate "already online" toasts fire. Directory failure tracks
    /// the club with an empty roster that a later
    /// [`refresh_club`](Self::refresh_club) repairs.
    pub async fn track_club(&self, club_id: ClubId, club_name: impl Into<String>) {
        let club_name = club_name.into();
        let member_ids = match self.directory.list_member_ids(club_id).await {
            Ok(member_ids) => member_ids,
            Err(error) => {
                warn!(
                    club_id = %club_id,
                    error = %error,
                    "Failed to enumerate club members, tracking with empty roster"
                );
                Vec::new()
            }
        };

        self.aggregator.register_club(club_id, &club_name);
        self.observer
            .watch(club_id, member_ids, self.observer_callback());
        info!(club_id = %club_id, club = %club_name, "Tracking club presence");
    }

    /// Re-enumerate a tracked club's membership and re-subscribe its
    /// watch. The club's snapshot is kept, so members who stayed online
    /// across the refresh do not re-announce themselves.
    pub async fn refresh_club(&self, club_id: ClubId) {
        let Some(club_name) = self.aggregator.club_name(club_id) else {
            warn!(club_id = %club_id, "Refresh requested for untracked club, ignoring");
            return;
        };
        self.track_club(club_id, club_name).await;
    }

    /// Stop tracking a club: cancel its watch and drop its snapshot.
    pub fn untrack_club(&self, club_id: ClubId) {
        self.observer.unwatch(club_id);
        self.aggregator.remove_club(club_id);
        info!(club_id = %club_id, "Stopped tracking club presence");
    }

    /// Members of a club currently derived online. Empty for unknown
    /// clubs.
    pub fn online_members(&self, club_id: ClubId) -> Vec<MemberPresenceView> {
        self.aggregator.online_members(club_id)
    }

    /// Every member view of a club from its last snapshot. Empty for
    /// unknown clubs.
    pub fn all_members(&self, club_id: ClubId) -> Vec<MemberPresenceView> {
        self.aggregator.all_members(club_id)
    }

    /// Online member count of a club. Zero for unknown clubs.
    pub fn online_count(&self, club_id: ClubId) -> usize {
        self.aggregator.online_count(club_id)
    }

    /// Derived online state of one member. False for unknown clubs and
    /// members.
    pub fn is_online(&self, club_id: ClubId, user_id: UserId) -> bool {
        self.aggregator.is_online(club_id, user_id)
    }

    pub fn stats(&self) -> PresenceStats {
        self.aggregator.stats()
    }

    pub fn metrics(&self) -> PresenceMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The local agent's own belief about being online.
    pub fn is_locally_online(&self) -> bool {
        self.agent.is_locally_online()
    }

    /// Page lifecycle: tab went hidden.
    pub fn page_hidden(&self) {
        self.agent.page_hidden();
    }

    /// Page lifecycle: tab became visible.
    pub async fn page_visible(&self) {
        self.agent.page_visible().await;
    }

    /// Page lifecycle: tab is closing. Best-effort, bounded.
    pub async fn unload(&self) {
        self.agent.unload().await;
    }

    /// Logout teardown: stop all watches, clear aggregated state, write
    /// the local user offline, stop the notification drain. Safe to
    /// call more than once.
    pub async fn shutdown(&self) {
        info!(user_id = %self.user_id, "Shutting down presence session");
        self.observer.unwatch_all();
        self.aggregator.clear();
        self.agent.stop().await;
        if let Some(notifier) = &self.notifier {
            notifier.shutdown();
        }
        info!(user_id = %self.user_id, "Presence session shut down");
    }

    fn observer_callback(&self) -> ObserverCallback {
        // The callback must not keep the session alive; it captures
        // only the aggregator it feeds.
        let aggregator = self.aggregator.clone();
        Arc::new(move |club_id, views| aggregator.on_observer_update(club_id, views))
    }
}
