//! Cooperative cancellation shared between the CLI, the orchestrator, and the
//! activation poller.

use tokio::sync::watch;

/// Fires a cancellation observed by every linked [`Cancellation`].
#[derive(Debug)]
pub struct CancellationHandle {
    sender: watch::Sender<bool>,
}

impl CancellationHandle {
    /// Requests cancellation. Repeated calls are harmless.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

/// Observer side of a cancellation signal.
#[derive(Clone, Debug)]
pub struct Cancellation {
    receiver: watch::Receiver<bool>,
}

impl Cancellation {
    /// Creates a linked handle and observer pair.
    #[must_use]
    pub fn new() -> (CancellationHandle, Self) {
        let (sender, receiver) = watch::channel(false);
        (CancellationHandle { sender }, Self { receiver })
    }

    /// Returns an observer that is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        let (_, observer) = Self::new();
        observer
    }

    /// Returns `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves when cancellation is requested. Never resolves when the
    /// handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
