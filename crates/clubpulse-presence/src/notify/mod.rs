//! Toast presentation and the paced notification sink.

mod paced;

use tracing::info;

use clubpulse_core::types::PresenceToast;

pub use paced::PacedNotifier;

/// The actual display seam: whatever renders a toast to the user.
pub trait ToastPresenter: Send + Sync + 'static {
    fn present(&self, toast: &PresenceToast);
}

/// Presenter that renders toasts as log lines. Used by the sandbox and
/// as the default where no UI is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPresenter;

impl ToastPresenter for TracingPresenter {
    fn present(&self, toast: &PresenceToast) {
        info!(club = %toast.club_name, "{}", toast.message());
    }
}
