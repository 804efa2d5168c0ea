//! Cancellation for load/save.

use tokio::sync::watch;

/// Receiving side, checked by load/save between chunks and lines.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Sending side; calling [`CancelHandle::cancel`] flips every linked token.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Create a linked handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        cancel_pair().1
    }

    /// Returns `true` once the linked handle requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}

impl CancelHandle {
    /// Request cancellation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}
