//! FIFO notification queue with burst-suppressing pacing.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use clubpulse_core::traits::NotificationSink;
use clubpulse_core::types::{PresenceToast, TransitionKind};

use crate::metrics::PresenceMetrics;
use crate::notify::ToastPresenter;

/// Notification sink that drains a FIFO queue one toast at a time with
/// a minimum delay between displays, so twenty simultaneous transitions
/// do not flood the screen.
///
/// Display policy lives here: ONLINE toasts are presented, OFFLINE
/// toasts are counted and dropped without consuming a pacing slot.
/// Arrival order is preserved; there are no priorities.
pub struct PacedNotifier {
    tx: mpsc::UnboundedSender<PresenceToast>,
    token: CancellationToken,
}

impl std::fmt::Debug for PacedNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacedNotifier").finish()
    }
}

impl PacedNotifier {
    /// Spawn the drain task. Must be called within a tokio runtime.
    pub fn new(
        presenter: Arc<dyn ToastPresenter>,
        pacing: Duration,
        metrics: Arc<PresenceMetrics>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        tokio::spawn(run_drain_loop(rx, presenter, pacing, token.clone(), metrics));
        Self { tx, token }
    }

    /// Stop the drain task. Queued, undisplayed toasts are dropped;
    /// presence toasts are worthless after the session that queued
    /// them ends.
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

impl Drop for PacedNotifier {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl NotificationSink for PacedNotifier {
    fn enqueue(&self, toast: PresenceToast) {
        if self.tx.send(toast).is_err() {
            trace!("Notifier already shut down, dropping toast");
        }
    }
}

async fn run_drain_loop(
    mut rx: mpsc::UnboundedReceiver<PresenceToast>,
    presenter: Arc<dyn ToastPresenter>,
    pacing: Duration,
    token: CancellationToken,
    metrics: Arc<PresenceMetrics>,
) {
    loop {
        let toast = tokio::select! {
            _ = token.cancelled() => break,
            received = rx.recv() => match received {
                Some(toast) => toast,
                None => break,
            },
        };

        match toast.kind {
            TransitionKind::Online => {
                presenter.present(&toast);
                metrics.toasts_displayed.fetch_add(1, Ordering::Relaxed);
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(pacing) => {}
                }
            }
            TransitionKind::Offline => {
                metrics.toasts_suppressed.fetch_add(1, Ordering::Relaxed);
                trace!(club = %toast.club_name, "Offline transition suppressed from display");
            }
        }
    }
    debug!("Notification drain loop stopped");
}
