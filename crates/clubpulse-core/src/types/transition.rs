//! Presence transition events and the notification payload built from them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ClubId, UserId};

/// Direction of a presence transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Online,
    Offline,
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionKind::Online => write!(f, "online"),
            TransitionKind::Offline => write!(f, "offline"),
        }
    }
}

/// A detected change in one member's derived online state.
///
/// Produced by diffing consecutive club snapshots, consumed once by the
/// notification layer, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceTransitionEvent {
    /// The member that transitioned.
    pub user_id: UserId,
    /// The club whose snapshot produced the event.
    pub club_id: ClubId,
    /// Which way the member transitioned.
    pub kind: TransitionKind,
    /// Display name at the time of the transition, if known.
    pub display_name: Option<String>,
    /// The snapshot instant the transition was observed at.
    pub at: DateTime<Utc>,
}

impl PresenceTransitionEvent {
    /// Convert into the sink-facing toast payload.
    pub fn into_toast(self, club_name: impl Into<String>) -> PresenceToast {
        PresenceToast {
            kind: self.kind,
            display_name: self.display_name,
            club_name: club_name.into(),
        }
    }
}

/// What the notification sink receives for one transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceToast {
    /// Direction of the transition behind this toast.
    pub kind: TransitionKind,
    /// Display name of the member, if their profile carried one.
    pub display_name: Option<String>,
    /// Human-readable club name for the toast body.
    pub club_name: String,
}

impl PresenceToast {
    /// Render the user-facing toast body.
    pub fn message(&self) -> String {
        let who = self.display_name.as_deref().unwrap_or("A member");
        format!("{} is {} in {}", who, self.kind, self.club_name)
    }
}
