//! Asynchronous primitive results
//!
//! A primitive that cannot finish synchronously returns a [`Promise`]. The
//! executor parks the thread in `PROMISE_WAIT` and hands the promise to the
//! runtime's pending queue; the runtime polls it (never blocking) at the
//! start of each tick and resumes the thread once it settles.

use crate::value::Value;
use std::future::Future;
use tokio::sync::oneshot::{self, error::TryRecvError};

/// Outcome of an asynchronous primitive: a value (or nothing), or a
/// rejection reason
pub type Settlement = Result<Option<Value>, String>;

/// Receiving half, returned from a primitive
#[derive(Debug)]
pub struct Promise {
    rx: oneshot::Receiver<Settlement>,
}

/// Sending half, kept by whatever completes the operation
#[derive(Debug)]
pub struct Resolver {
    tx: oneshot::Sender<Settlement>,
}

/// Create a linked resolver/promise pair
pub fn promise() -> (Resolver, Promise) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, Promise { rx })
}

impl Resolver {
    pub fn resolve(self, value: Option<Value>) {
        self.settle(Ok(value));
    }

    pub fn reject(self, reason: impl Into<String>) {
        self.settle(Err(reason.into()));
    }

    pub fn settle(self, settlement: Settlement) {
        // The receiver is gone when the thread was retired; nothing to resume.
        let _ = self.tx.send(settlement);
    }
}

impl Promise {
    /// A promise that is already settled with `value`
    pub fn resolved(value: Option<Value>) -> Self {
        let (resolver, promise) = promise();
        resolver.resolve(value);
        promise
    }

    /// Drive `future` on the ambient tokio runtime and settle with its output.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Settlement> + Send + 'static,
    {
        let (resolver, promise) = promise();
        tokio::spawn(async move {
            resolver.settle(future.await);
        });
        promise
    }

    /// Non-blocking poll. A dropped resolver counts as a rejection.
    pub(crate) fn try_settle(&mut self) -> Option<Settlement> {
        match self.rx.try_recv() {
            Ok(settlement) => Some(settlement),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err("promise resolver dropped".to_string())),
        }
    }
}
