//! Cancellation signal shared by every request of one poll activation
//!
//! A `CancelSource` is created per activation and hands out cheap
//! `CancelSignal` clones. Dropping the source counts as cancelling it.

use tokio::sync::watch;

/// Owning side of a cancellation signal
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// Observing side, cloned into every request of a fetch cycle
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CancelSource {
    fn drop(&mut self) {
        self.tx.send_replace(true);
    }
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal fires (or its source is gone)
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // A closed channel means the source was dropped, which is a cancellation too.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
