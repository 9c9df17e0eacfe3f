//! Local-user presence agent.

mod heartbeat;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use clubpulse_core::config::presence::PresenceConfig;
use clubpulse_core::traits::UserRecordStore;
use clubpulse_core::types::{PresencePatch, UserId};

use crate::metrics::PresenceMetrics;

use heartbeat::run_heartbeat_loop;

/// Local lifecycle of the agent. This is the agent's *belief*, kept
/// eventually consistent with the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Offline,
    Online,
}

#[derive(Debug)]
struct AgentState {
    lifecycle: Lifecycle,
    /// Cancellation token of the current heartbeat generation.
    generation: Option<CancellationToken>,
    /// Cancellation token of the pending deferred-offline timer.
    hidden_timer: Option<CancellationToken>,
    /// Set when the grace period took the agent offline while hidden,
    /// so a visibility return knows to restart. Explicit stops clear it.
    resume_on_visible: bool,
}

struct AgentInner {
    user_id: UserId,
    store: Arc<dyn UserRecordStore>,
    config: PresenceConfig,
    metrics: Arc<PresenceMetrics>,
    state: Mutex<AgentState>,
    /// Serializes lifecycle transitions end to end (state flip plus the
    /// online/offline store write), so transitions land in decision
    /// order. Heartbeat writes stay outside: they never touch
    /// `is_online` and are fenced by the generation token instead.
    write_gate: tokio::sync::Mutex<()>,
}

impl AgentInner {
    fn state(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Flip the local state to offline, cancelling the hidden timer and
    /// the heartbeat generation before any offline write can be issued.
    /// Returns false when already offline. Callers hold the write gate.
    fn flip_offline(&self, resume_on_visible: bool) -> bool {
        let mut state = self.state();
        if let Some(timer) = state.hidden_timer.take() {
            timer.cancel();
        }
        if state.lifecycle == Lifecycle::Offline {
            return false;
        }
        if let Some(generation) = state.generation.take() {
            generation.cancel();
        }
        state.lifecycle = Lifecycle::Offline;
        state.resume_on_visible = resume_on_visible;
        true
    }

    async fn write_offline(&self, reason: &'static str) {
        let patch = PresencePatch::offline(Utc::now());
        match self.store.write(self.user_id, patch).await {
            Ok(()) => debug!(user_id = %self.user_id, reason, "Offline state written"),
            Err(error) => warn!(
                user_id = %self.user_id,
                error = %error,
                reason,
                "Offline write failed, staleness reclamation will correct the record"
            ),
        }
    }

    /// The deferred-offline timer fired. A visibility return may have
    /// raced the timer; the token check and the state flip happen in a
    /// single locked section, so exactly one of them wins.
    async fn deferred_offline(&self, timer: &CancellationToken) {
        let _gate = self.write_gate.lock().await;
        let fire = {
            let mut state = self.state();
            if timer.is_cancelled() || state.lifecycle == Lifecycle::Offline {
                false
            } else {
                state.hidden_timer = None;
                if let Some(generation) = state.generation.take() {
                    generation.cancel();
                }
                state.lifecycle = Lifecycle::Offline;
                state.resume_on_visible = true;
                true
            }
        };
        if !fire {
            return;
        }
        info!(user_id = %self.user_id, "Hidden grace elapsed, going offline");
        self.write_offline("hidden grace elapsed").await;
    }
}

impl Drop for AgentInner {
    fn drop(&mut self) {
        // No offline write here: a dropped agent is indistinguishable
        // from a crashed one, and observers reclaim the record through
        // heartbeat staleness.
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(generation) = state.generation.take() {
            generation.cancel();
        }
        if let Some(timer) = state.hidden_timer.take() {
            timer.cancel();
        }
    }
}

/// Maintains the local user's own presence record: the online flag,
/// periodic heartbeats, and the page-lifecycle transitions around them.
///
/// Every operation is best-effort and infallible from the caller's
/// point of view; store failures are logged and corrected by the next
/// heartbeat or by observer-side staleness reclamation. One agent
/// instance corresponds to one login session.
#[derive(Clone)]
pub struct PresenceAgent {
    inner: Arc<AgentInner>,
}

impl std::fmt::Debug for PresenceAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceAgent")
            .field("user_id", &self.inner.user_id)
            .field("lifecycle", &self.inner.state().lifecycle)
            .finish()
    }
}

impl PresenceAgent {
    /// Create an agent for one user. The agent starts offline; nothing
    /// is written until [`start`](Self::start).
    pub fn new(
        user_id: UserId,
        store: Arc<dyn UserRecordStore>,
        config: PresenceConfig,
        metrics: Arc<PresenceMetrics>,
    ) -> Self {
        Self {
            inner: Arc::new(AgentInner {
                user_id,
                store,
                config,
                metrics,
                state: Mutex::new(AgentState {
                    lifecycle: Lifecycle::Offline,
                    generation: None,
                    hidden_timer: None,
                    resume_on_visible: false,
                }),
                write_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Mark the user online and start heartbeating.
    ///
    /// Opens a new heartbeat generation, cancelling any previous one, so
    /// calling `start` on an already-online agent re-subscribes rather
    /// than leaking a second loop.
    pub async fn start(&self) {
        let _gate = self.inner.write_gate.lock().await;
        let token = {
            let mut state = self.inner.state();
            if let Some(previous) = state.generation.take() {
                previous.cancel();
            }
            let token = CancellationToken::new();
            state.generation = Some(token.clone());
            state.lifecycle = Lifecycle::Online;
            state.resume_on_visible = false;
            token
        };

        let patch = PresencePatch::online(Utc::now());
        if let Err(error) = self.inner.store.write(self.inner.user_id, patch).await {
            // Heartbeat patches never set the online flag, so the member
            // may appear offline until the next start.
            warn!(
                user_id = %self.inner.user_id,
                error = %error,
                "Online write failed"
            );
        }

        tokio::spawn(run_heartbeat_loop(
            self.inner.user_id,
            self.inner.store.clone(),
            self.inner.config.heartbeat_interval(),
            token,
            self.inner.metrics.clone(),
        ));
        info!(user_id = %self.inner.user_id, "Presence agent online");
    }

    /// The page went hidden: arm the deferred-offline timer without
    /// changing state. Re-arming replaces any pending timer.
    pub fn page_hidden(&self) {
        let grace = self.inner.config.hidden_grace();
        let token = {
            let mut state = self.inner.state();
            if state.lifecycle == Lifecycle::Offline {
                return;
            }
            if let Some(previous) = state.hidden_timer.take() {
                previous.cancel();
            }
            let token = CancellationToken::new();
            state.hidden_timer = Some(token.clone());
            token
        };

        // The timer task holds only a weak reference: a dropped agent
        // must not be kept alive (or written to) by its own timer.
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(grace) => {
                    if let Some(inner) = weak.upgrade() {
                        inner.deferred_offline(&token).await;
                    }
                }
            }
        });
        debug!(
            user_id = %self.inner.user_id,
            grace_seconds = grace.as_secs(),
            "Page hidden, deferred offline armed"
        );
    }

    /// The page became visible again: cancel any pending deferred
    /// offline, and restart if the grace period already took the agent
    /// offline while hidden.
    pub async fn page_visible(&self) {
        let needs_restart = {
            let mut state = self.inner.state();
            if let Some(timer) = state.hidden_timer.take() {
                timer.cancel();
            }
            state.lifecycle == Lifecycle::Offline && state.resume_on_visible
        };
        if needs_restart {
            debug!(user_id = %self.inner.user_id, "Page visible after grace elapsed, restarting");
            self.start().await;
        }
    }

    /// Explicit logout: stop heartbeats, write the offline state.
    /// Calling `stop` on an already-offline agent is a no-op.
    pub async fn stop(&self) {
        let _gate = self.inner.write_gate.lock().await;
        if !self.inner.flip_offline(false) {
            return;
        }
        self.inner.write_offline("stopped").await;
        info!(user_id = %self.inner.user_id, "Presence agent stopped");
    }

    /// Best-effort offline write on tab close. Bounded by a short
    /// timeout so teardown can never hang; if the write is lost,
    /// staleness reclamation corrects the record.
    pub async fn unload(&self) {
        let _gate = self.inner.write_gate.lock().await;
        if !self.inner.flip_offline(false) {
            return;
        }
        let patch = PresencePatch::offline(Utc::now());
        let write = self.inner.store.write(self.inner.user_id, patch);
        match tokio::time::timeout(self.inner.config.unload_write_timeout(), write).await {
            Ok(Ok(())) => debug!(user_id = %self.inner.user_id, "Unload offline write completed"),
            Ok(Err(error)) => debug!(
                user_id = %self.inner.user_id,
                error = %error,
                "Unload offline write failed, leaving it to staleness reclamation"
            ),
            Err(_) => debug!(
                user_id = %self.inner.user_id,
                "Unload offline write timed out, leaving it to staleness reclamation"
            ),
        }
    }

    /// The agent's local belief. Observers may lag behind it.
    pub fn is_locally_online(&self) -> bool {
        self.inner.state().lifecycle == Lifecycle::Online
    }

    #[cfg(test)]
    fn has_pending_hidden_timer(&self) -> bool {
        self.inner.state().hidden_timer.is_some()
    }
}
