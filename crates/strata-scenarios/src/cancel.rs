//! Cooperative cancellation for regenerations

use tokio::sync::watch;

/// Caller side: flips the shared flag
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Request cancellation
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Regeneration side: polled between states
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// Linked handle and signal
    #[must_use]
    pub fn pair() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle(tx), Self(rx))
    }

    /// A signal nobody can trigger
    #[must_use]
    pub fn never() -> Self {
        Self::pair().1
    }

    /// Whether cancellation was requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}
