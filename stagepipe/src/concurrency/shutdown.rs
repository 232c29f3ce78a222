//! Cooperative cancellation shared by every stage of a pipeline.
//!
//! The pipeline owner holds a [`ShutdownTx`] and hands a [`ShutdownRx`] to every stage. Triggering
//! is idempotent and, since it is backed by a watch channel, visible to every current and future
//! receiver without any further synchronization.

use std::future::Future;

use tokio::sync::watch;

/// Result of an operation raced against the shutdown signal.
///
/// `T` is the output of the operation when it wins the race, `I` is whatever the caller wants to
/// hand back when shutdown wins instead.
#[derive(Debug, PartialEq, Eq)]
pub enum ShutdownResult<T, I> {
    Ok(T),
    Shutdown(I),
}

/// Transmitter side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Wraps a watch sender into a [`ShutdownTx`].
    pub fn new(tx: watch::Sender<bool>) -> Self {
        Self(tx)
    }

    /// Triggers the shutdown.
    ///
    /// Returns `true` only for the call that actually flipped the signal, later calls are no-ops
    /// and return `false`. Works even when no receiver is subscribed yet.
    pub fn shutdown(&self) -> bool {
        self.0.send_if_modified(|shutdown| {
            if *shutdown {
                return false;
            }

            *shutdown = true;
            true
        })
    }

    /// Returns `true` once the shutdown has been triggered.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }

    /// Creates a new shutdown receiver subscription.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }

    /// Returns a guard that triggers the shutdown when dropped.
    pub fn guard(&self) -> ShutdownGuard {
        ShutdownGuard(self.clone())
    }
}

/// Receiver side of the shutdown signal.
///
/// Every worker owns its own clone, so each one observes the transition independently.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Returns `true` once the shutdown has been triggered.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until the shutdown is triggered.
    ///
    /// Also resolves when every [`ShutdownTx`] has been dropped, since the owner of the pipeline
    /// is then gone and nothing could trigger the signal anymore.
    pub async fn cancelled(&mut self) {
        loop {
            let shutdown = *self.0.borrow_and_update();
            if shutdown {
                return;
            }

            if self.0.changed().await.is_err() {
                return;
            }
        }
    }

    /// Drives `future` to completion unless the shutdown is triggered first.
    ///
    /// The race is biased towards the shutdown signal, so an operation that is ready at the same
    /// time as the shutdown is not performed.
    pub async fn run_until_cancelled<F>(&mut self, future: F) -> ShutdownResult<F::Output, ()>
    where
        F: Future,
    {
        tokio::select! {
            biased;

            _ = self.cancelled() => ShutdownResult::Shutdown(()),
            output = future => ShutdownResult::Ok(output),
        }
    }
}

/// Triggers the shutdown when dropped.
///
/// Held by the owner of a pipeline so that leaving its scope, for whatever reason, stops every
/// worker.
#[derive(Debug)]
#[must_use = "the shutdown is triggered as soon as the guard is dropped"]
pub struct ShutdownGuard(ShutdownTx);

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

/// Creates a new shutdown channel in the non-triggered state.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx::new(tx), ShutdownRx(rx))
}
