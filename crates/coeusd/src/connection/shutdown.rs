//! Countdown latch for the two-phase connection close.
//!
//! Each pump holds one [`Completion`]. Dropping it (normally at the end of
//! the pump, or because the task panicked or was aborted) counts down; the
//! latch opens exactly once, when the last part reports.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

struct LatchInner {
    remaining: AtomicUsize,
    done: watch::Sender<bool>,
}

/// Waits until every part of a shutdown has completed.
pub struct ShutdownLatch {
    done: watch::Receiver<bool>,
}

/// One part of a shutdown. Reports completion when dropped.
pub struct Completion {
    inner: Arc<LatchInner>,
}

impl ShutdownLatch {
    /// Latch for a connection: one completion per pump.
    pub fn pair() -> (Self, Completion, Completion) {
        let (tx, rx) = watch::channel(false);
        let inner = Arc::new(LatchInner {
            remaining: AtomicUsize::new(2),
            done: tx,
        });
        let first = Completion {
            inner: Arc::clone(&inner),
        };
        let second = Completion { inner };
        (Self { done: rx }, first, second)
    }

    /// Resolves once all parts have completed, in whatever order.
    pub async fn wait(&mut self) {
        // The last completion publishes `true` before the sender drops, so
        // an error here can only mean the latch is already open.
        let _ = self.done.wait_for(|done| *done).await;
    }

    #[cfg(test)]
    fn is_open(&self) -> bool {
        *self.done.borrow()
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.inner.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.done.send_replace(true);
        }
    }
}
