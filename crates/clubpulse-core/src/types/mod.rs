//! Core type definitions used across the ClubPulse workspace.

pub mod id;
pub mod record;
pub mod snapshot;
pub mod transition;
pub mod view;

pub use id::*;
pub use record::{PresencePatch, UserPresenceRecord};
pub use snapshot::{diff_online_transitions, ClubPresenceSnapshot};
pub use transition::{PresenceToast, PresenceTransitionEvent, TransitionKind};
pub use view::MemberPresenceView;
