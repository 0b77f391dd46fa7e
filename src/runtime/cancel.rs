//! Cancellation signal shared by one pipeline invocation
//!
//! A `CancelHandle` is held by whoever owns the run (the CLI binds it to
//! Ctrl-C). Every `CancelSignal` cloned from the pair observes the same flag.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{StepError, StepResult};

/// Create a connected handle/signal pair
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelSignal { rx })
}

/// Owner side of a cancellation pair
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side of a cancellation pair
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that is never raised
    pub fn never() -> Self {
        let (_, signal) = cancel_pair();
        signal
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested.
    ///
    /// Pends forever if the handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Race `fut` against cancellation
    pub async fn guard<F, T>(&self, fut: F) -> StepResult<T>
    where
        F: Future<Output = StepResult<T>>,
    {
        if self.is_cancelled() {
            return Err(StepError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(StepError::Cancelled),
            result = fut => result,
        }
    }
}
