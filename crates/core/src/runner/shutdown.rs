//! Listens for the operator shutdown broadcast.

use tokio::sync::broadcast;

/// Receiving end of the shutdown broadcast.
///
/// Once a shutdown has been observed it stays observed, so later stages of the
/// same job see it immediately. A dropped sender never counts as a shutdown.
#[derive(Debug)]
pub struct Shutdown {
    is_shutdown: bool,
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    pub fn new(notify: broadcast::Receiver<()>) -> Self {
        Self {
            is_shutdown: false,
            notify,
        }
    }

    /// A listener that is never notified.
    pub fn never() -> Self {
        let (_tx, rx) = broadcast::channel(1);
        Self::new(rx)
    }

    /// Marks the listener as shut down without waiting for a notification.
    pub fn mark_shutdown(&mut self) {
        self.is_shutdown = true;
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown
    }

    /// Waits until a shutdown is broadcast.
    pub async fn recv(&mut self) {
        if self.is_shutdown {
            return;
        }

        match self.notify.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                self.is_shutdown = true;
            }
            Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}
