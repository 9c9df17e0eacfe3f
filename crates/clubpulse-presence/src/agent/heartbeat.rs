//! Heartbeat loop for one agent generation.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use clubpulse_core::traits::UserRecordStore;
use clubpulse_core::types::{PresencePatch, UserId};

use crate::metrics::PresenceMetrics;

/// Periodically refreshes `last_heartbeat` until the generation token is
/// cancelled.
///
/// The task holds no reference back to the agent, so dropping the agent
/// without stopping it (the crash scenario) leaves nothing here alive
/// once the token is cancelled by the agent's `Drop`.
///
/// Cancellation is also honored mid-write: an in-flight heartbeat is
/// abandoned rather than awaited, and because the heartbeat patch only
/// touches `last_heartbeat`, a write that still lands late can never
/// overwrite an offline transition.
pub(crate) async fn run_heartbeat_loop(
    user_id: UserId,
    store: Arc<dyn UserRecordStore>,
    interval: Duration,
    token: CancellationToken,
    metrics: Arc<PresenceMetrics>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the online write that opened
    // this generation already carried a heartbeat, so skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        // The tick and the cancellation can become ready together; the
        // generation must win before another write goes out.
        if token.is_cancelled() {
            break;
        }

        let write = store.write(user_id, PresencePatch::heartbeat(Utc::now()));
        tokio::select! {
            _ = token.cancelled() => break,
            result = write => match result {
                Ok(()) => {
                    metrics.heartbeats_written.fetch_add(1, Ordering::Relaxed);
                }
                Err(error) => {
                    metrics.heartbeat_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        user_id = %user_id,
                        error = %error,
                        "Heartbeat write failed, will retry on next tick"
                    );
                }
            }
        }
    }

    debug!(user_id = %user_id, "Heartbeat loop stopped");
}
