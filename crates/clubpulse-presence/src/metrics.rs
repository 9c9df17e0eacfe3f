//! Presence engine metrics counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level metrics counters, shared across all presence subsystems
/// of one session.
#[derive(Debug)]
pub struct PresenceMetrics {
    /// Heartbeat patches successfully written
    pub heartbeats_written: AtomicU64,
    /// Heartbeat writes that failed (retried on the next tick)
    pub heartbeat_failures: AtomicU64,
    /// Observer poll ticks that produced a snapshot
    pub polls_completed: AtomicU64,
    /// Observer poll ticks that failed or timed out
    pub poll_failures: AtomicU64,
    /// Poll results discarded by the tick sequence guard
    pub stale_ticks_discarded: AtomicU64,
    /// Online/offline transition events emitted by diffing
    pub transitions_emitted: AtomicU64,
    /// Toasts actually shown to the user
    pub toasts_displayed: AtomicU64,
    /// Toasts suppressed by display policy
    pub toasts_suppressed: AtomicU64,
}

impl PresenceMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self {
            heartbeats_written: AtomicU64::new(0),
            heartbeat_failures: AtomicU64::new(0),
            polls_completed: AtomicU64::new(0),
            poll_failures: AtomicU64::new(0),
            stale_ticks_discarded: AtomicU64::new(0),
            transitions_emitted: AtomicU64::new(0),
            toasts_displayed: AtomicU64::new(0),
            toasts_suppressed: AtomicU64::new(0),
        }
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> PresenceMetricsSnapshot {
        PresenceMetricsSnapshot {
            heartbeats_written: self.heartbeats_written.load(Ordering::Relaxed),
            heartbeat_failures: self.heartbeat_failures.load(Ordering::Relaxed),
            polls_completed: self.polls_completed.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            stale_ticks_discarded: self.stale_ticks_discarded.load(Ordering::Relaxed),
            transitions_emitted: self.transitions_emitted.load(Ordering::Relaxed),
            toasts_displayed: self.toasts_displayed.load(Ordering::Relaxed),
            toasts_suppressed: self.toasts_suppressed.load(Ordering::Relaxed),
        }
    }
}

impl Default for PresenceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceMetricsSnapshot {
    /// Heartbeat patches successfully written
    pub heartbeats_written: u64,
    /// Heartbeat writes that failed
    pub heartbeat_failures: u64,
    /// Poll ticks that produced a snapshot
    pub polls_completed: u64,
    /// Poll ticks that failed or timed out
    pub poll_failures: u64,
    /// Poll results discarded by the sequence guard
    pub stale_ticks_discarded: u64,
    /// Transition events emitted
    pub transitions_emitted: u64,
    /// Toasts displayed
    pub toasts_displayed: u64,
    /// Toasts suppressed
    pub toasts_suppressed: u64,
}
