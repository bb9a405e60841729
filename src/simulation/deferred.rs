//! One-shot delayed transitions
//!
//! Bond completion, division reset and evolution each run on their own
//! timer, independent of the periodic cycle. They are fire-and-forget:
//! nothing cancels them, and stopping the scheduler leaves them running.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct DeferredQueue {
    pending: Arc<AtomicUsize>,
}

/// Decrements the pending count even if the transition panics
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `transition` once, at or after `delay` from now
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, label: &'static str, delay: Duration, transition: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let guard = PendingGuard(Arc::clone(&self.pending));

        debug!(
            transition = label,
            delay_ms = delay.as_millis() as u64,
            "Scheduled delayed transition"
        );

        tokio::spawn(async move {
            let _guard = guard;
            tokio::time::sleep(delay).await;
            transition.await;
        });
    }

    /// Transitions scheduled but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}
