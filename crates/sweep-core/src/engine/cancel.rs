//! Cooperative cancellation scoped to one loop execution

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cancellation signal shared between the engine, the caller and the
/// step-execution collaborator
///
/// Checked between sweep points; children already started are awaited.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Fresh, uncancelled token
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!("cancellation requested");
        }
        self.inner.notify.notify_waiters();
    }

    /// Whether the signal was raised
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until the signal is raised
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
