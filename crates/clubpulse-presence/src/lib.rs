//! # clubpulse-presence
//!
//! Presence engine for ClubPulse. Provides:
//!
//! - A local-user presence agent (online/offline writes, heartbeats,
//!   page-lifecycle handling with a deferred-offline grace period)
//! - Per-club observers that poll member records and derive online state
//!   through a heartbeat staleness rule
//! - An aggregator owning per-club snapshots, synchronous lookups, and
//!   online/offline transition detection
//! - A paced notification pipeline (FIFO, burst-suppressing)
//! - A session-scoped engine object tying the pieces together for one
//!   authenticated user
//!
//! Presence is best-effort by design: every public operation succeeds,
//! no-ops, or logs and continues. Collaborator failures are absorbed at
//! the boundary and corrected by the next timer tick or by staleness
//! reclamation.

pub mod agent;
pub mod aggregator;
pub mod metrics;
pub mod notify;
pub mod observer;
pub mod session;

pub use agent::PresenceAgent;
pub use aggregator::{PresenceAggregator, PresenceStats};
pub use metrics::{PresenceMetrics, PresenceMetricsSnapshot};
pub use notify::{PacedNotifier, ToastPresenter, TracingPresenter};
pub use observer::{ObserverCallback, PresenceObserver};
pub use session::PresenceSession;
