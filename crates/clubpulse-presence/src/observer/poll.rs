//! Poll loop for one club watch: batch fetch, staleness derivation,
//! tick sequencing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use clubpulse_core::config::presence::PresenceConfig;
use clubpulse_core::traits::UserRecordStore;
use clubpulse_core::types::{ClubId, MemberPresenceView, UserId, UserPresenceRecord};

use crate::metrics::PresenceMetrics;
use crate::observer::ObserverCallback;

/// Admits poll results in tick order: a result may only be applied if
/// its sequence number is higher than everything applied before it.
///
/// Each loop awaits its fetch inline, so within one loop the gate never
/// rejects; it earns its keep across loops. A re-watch replaces the
/// poll loop but keeps the club's gate, so a tick still in flight in
/// the dying loop can never overwrite the new loop's fresher result.
#[derive(Debug, Default)]
pub(crate) struct TickGate {
    applied: AtomicU64,
}

impl TickGate {
    /// Returns true if `seq` is newer than every previously admitted
    /// tick, and records it. Ties and older sequences are rejected.
    pub(crate) fn admit(&self, seq: u64) -> bool {
        let mut current = self.applied.load(Ordering::Acquire);
        loop {
            if seq <= current {
                return false;
            }
            match self.applied.compare_exchange(
                current,
                seq,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Per-club tick state shared by every poll loop that has ever watched
/// the club in this session: a monotonic sequence source and the gate
/// that admits results in sequence order.
#[derive(Debug, Default)]
pub(crate) struct ClubTicks {
    next: AtomicU64,
    gate: TickGate,
}

impl ClubTicks {
    /// Draw the sequence number for a tick that is about to fetch.
    pub(crate) fn begin(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn admit(&self, seq: u64) -> bool {
        self.gate.admit(seq)
    }
}

/// Derive one view per roster member, in roster order. Members without
/// a record come out as offline views, never as errors.
pub(crate) fn derive_views(
    member_ids: &[UserId],
    records: Vec<UserPresenceRecord>,
    now: DateTime<Utc>,
    stale_threshold: chrono::Duration,
) -> Vec<MemberPresenceView> {
    let mut by_id: HashMap<UserId, UserPresenceRecord> = records
        .into_iter()
        .map(|record| (record.user_id, record))
        .collect();

    member_ids
        .iter()
        .map(|user_id| match by_id.remove(user_id) {
            Some(record) => MemberPresenceView::from_record(&record, now, stale_threshold),
            None => MemberPresenceView::missing(*user_id),
        })
        .collect()
}

/// Polls the record store for one club until the watch token is
/// cancelled, invoking the callback with the full derived member list
/// on every successful tick (even when nothing changed; the consumer
/// diffs).
///
/// A failed or timed-out fetch is logged and skipped: the consumer
/// keeps its last known-good view rather than flickering to empty.
pub(crate) async fn run_poll_loop(
    club_id: ClubId,
    member_ids: Vec<UserId>,
    store: Arc<dyn UserRecordStore>,
    config: PresenceConfig,
    ticks: Arc<ClubTicks>,
    token: CancellationToken,
    metrics: Arc<PresenceMetrics>,
    callback: ObserverCallback,
) {
    let mut ticker = tokio::time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        // An unwatch can land together with the tick; it must win
        // before this loop draws a sequence number or touches the store.
        if token.is_cancelled() {
            break;
        }
        let seq = ticks.begin();

        let fetch = tokio::time::timeout(config.fetch_timeout(), store.read_many(&member_ids));
        let outcome = tokio::select! {
            _ = token.cancelled() => break,
            outcome = fetch => outcome,
        };

        match outcome {
            Ok(Ok(records)) => {
                if token.is_cancelled() {
                    break;
                }
                if !ticks.admit(seq) {
                    metrics.stale_ticks_discarded.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                let views =
                    derive_views(&member_ids, records, Utc::now(), config.stale_threshold());
                metrics.polls_completed.fetch_add(1, Ordering::Relaxed);
                callback(club_id, views);
            }
            Ok(Err(error)) => {
                metrics.poll_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    club_id = %club_id,
                    error = %error,
                    "Presence poll failed, keeping last known view"
                );
            }
            Err(_) => {
                metrics.poll_failures.fetch_add(1, Ordering::Relaxed);
                warn!(club_id = %club_id, "Presence poll timed out, keeping last known view");
            }
        }
    }

    debug!(club_id = %club_id, "Presence poll loop stopped");
}
