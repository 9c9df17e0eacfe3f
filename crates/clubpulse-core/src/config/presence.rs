//! Presence engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Presence engine tunables.
///
/// None of these values are hardcoded anywhere in the engine; every timer
/// and threshold reads from this struct. The serde defaults match the
/// production values the club application ships with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Interval between heartbeat writes while the local agent is online,
    /// in seconds.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Interval between observer polls of watched member records, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Maximum heartbeat age before a self-reported online flag is
    /// distrusted, in seconds.
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_seconds: u64,
    /// Grace period after the page is hidden before the agent transitions
    /// to offline, in seconds.
    #[serde(default = "default_hidden_grace")]
    pub hidden_grace_seconds: u64,
    /// Minimum delay between two displayed presence notifications, in
    /// milliseconds.
    #[serde(default = "default_notification_pacing")]
    pub notification_pacing_ms: u64,
    /// Upper bound on one observer batch fetch, in seconds. A fetch that
    /// exceeds this counts as a failed tick.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_seconds: u64,
    /// Upper bound on the best-effort offline write at tab unload, in
    /// milliseconds.
    #[serde(default = "default_unload_write_timeout")]
    pub unload_write_timeout_ms: u64,
}

impl PresenceConfig {
    /// Heartbeat interval as a [`Duration`].
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    /// Observer poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Staleness threshold as a [`chrono::Duration`] for timestamp math.
    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_threshold_seconds as i64)
    }

    /// Hidden grace period as a [`Duration`].
    pub fn hidden_grace(&self) -> Duration {
        Duration::from_secs(self.hidden_grace_seconds)
    }

    /// Notification pacing as a [`Duration`].
    pub fn notification_pacing(&self) -> Duration {
        Duration::from_millis(self.notification_pacing_ms)
    }

    /// Observer fetch timeout as a [`Duration`].
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    /// Unload write timeout as a [`Duration`].
    pub fn unload_write_timeout(&self) -> Duration {
        Duration::from_millis(self.unload_write_timeout_ms)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            poll_interval_seconds: default_poll_interval(),
            stale_threshold_seconds: default_stale_threshold(),
            hidden_grace_seconds: default_hidden_grace(),
            notification_pacing_ms: default_notification_pacing(),
            fetch_timeout_seconds: default_fetch_timeout(),
            unload_write_timeout_ms: default_unload_write_timeout(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    10
}

fn default_stale_threshold() -> u64 {
    120
}

fn default_hidden_grace() -> u64 {
    60
}

fn default_notification_pacing() -> u64 {
    2000
}

fn default_fetch_timeout() -> u64 {
    8
}

fn default_unload_write_timeout() -> u64 {
    1500
}
