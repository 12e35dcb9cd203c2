use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;

/// Cancellable handle to a scheduled reconnection.
///
/// Dropping the handle does **not** cancel the timer. Cancelling is idempotent
/// and a no-op once the callback has run.
#[derive(Debug, Clone)]
pub struct ReconnectHandle {
    cancelled: Arc<AtomicBool>,
    fired: Arc<AtomicBool>,
    abort: AbortHandle,
    attempt: u32,
    delay: Duration,
}

impl ReconnectHandle {
    pub(crate) fn new(
        cancelled: Arc<AtomicBool>,
        fired: Arc<AtomicBool>,
        abort: AbortHandle,
        attempt: u32,
        delay: Duration,
    ) -> Self {
        Self {
            cancelled,
            fired,
            abort,
            attempt,
            delay,
        }
    }

    /// Prevents the callback from running if it has not started yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.abort.abort();
    }

    /// Returns true once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns true once the callback has been invoked.
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Returns true once the timer task has completed, fired or not.
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }

    /// The attempt number this timer was armed for.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The delay the timer was armed with.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}
