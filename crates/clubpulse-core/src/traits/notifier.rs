//! Notification sink trait.

use crate::types::PresenceToast;

/// Trait for the component that receives presence toasts.
///
/// `enqueue` is fire-and-forget: it must return immediately, never
/// block the caller, and never report failure back. Pacing, display
/// policy (which kinds are shown) and delivery are entirely the sink's
/// concern.
pub trait NotificationSink: Send + Sync + 'static {
    /// Hand a toast to the sink. Synchronous and non-blocking.
    fn enqueue(&self, toast: PresenceToast);
}
