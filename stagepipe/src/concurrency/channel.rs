//! Unbuffered hand-off channels connecting pipeline stages.
//!
//! A [`Sender::send`] only completes once some receiver has taken the value, which gives every
//! stage the blocking rendezvous semantics the pipeline relies on. The channel is built from tokio
//! primitives: values travel through an mpsc channel together with a oneshot acknowledgement that
//! the receiving side fires when it takes the value.
//!
//! Closing a channel means dropping its last strong [`Sender`]. Ownership makes a send after close
//! impossible, and a [`WeakSender`] lets extra producers write without holding the channel open.
//!
//! [`Receiver`] is cloneable and its clones share a single queue. Concurrent receivers therefore
//! split the values between them, each value going to exactly one of them.

use std::future::Future;
use std::sync::Arc;

use futures::Stream;
use futures::stream;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc, oneshot};

/// A value in flight together with the acknowledgement expected by its sender.
type Handoff<T> = (T, oneshot::Sender<()>);

/// Error returned when a value cannot be handed off because every receiver is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("channel closed: every receiver has been dropped")]
pub struct SendError;

/// Common interface of the strong and weak sending halves.
pub trait ChannelSender<T>: Send + Sync {
    /// Hands `value` off to a receiver, waiting until one takes it.
    fn send(&self, value: T) -> impl Future<Output = Result<(), SendError>> + Send;
}

/// Strong sending half of a channel. The channel closes when the last one is dropped.
#[derive(Debug)]
pub struct Sender<T> {
    tx: mpsc::Sender<Handoff<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send> Sender<T> {
    /// Hands `value` off to a receiver.
    ///
    /// Completes once a receiver has taken the value. If this future is dropped before that
    /// happens, the value is withdrawn and no receiver will observe it.
    pub async fn send(&self, value: T) -> Result<(), SendError> {
        let permit = self.tx.reserve().await.map_err(|_| SendError)?;

        let (ack_tx, ack_rx) = oneshot::channel();
        permit.send((value, ack_tx));

        // The receiving side drops the acknowledgement without firing it only when the whole
        // channel is torn down with the value still queued.
        ack_rx.await.map_err(|_| SendError)
    }

    /// Creates a [`WeakSender`] that can send without keeping the channel open.
    pub fn downgrade(&self) -> WeakSender<T> {
        WeakSender {
            tx: self.tx.downgrade(),
        }
    }

    /// Returns `true` if every receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T: Send> ChannelSender<T> for Sender<T> {
    fn send(&self, value: T) -> impl Future<Output = Result<(), SendError>> + Send {
        Sender::send(self, value)
    }
}

/// Sending half that does not keep the channel open.
///
/// Sending through a [`WeakSender`] fails with [`SendError`] once every strong [`Sender`] is gone,
/// since the channel is closed at that point.
#[derive(Debug)]
pub struct WeakSender<T> {
    tx: mpsc::WeakSender<Handoff<T>>,
}

impl<T> Clone for WeakSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send> WeakSender<T> {
    /// Hands `value` off to a receiver, see [`Sender::send`].
    pub async fn send(&self, value: T) -> Result<(), SendError> {
        let Some(tx) = self.tx.upgrade() else {
            return Err(SendError);
        };

        Sender { tx }.send(value).await
    }
}

impl<T: Send> ChannelSender<T> for WeakSender<T> {
    fn send(&self, value: T) -> impl Future<Output = Result<(), SendError>> + Send {
        WeakSender::send(self, value)
    }
}

/// Receiving half of a channel.
///
/// Clones share the same queue; use them to let several workers consume one channel.
#[derive(Debug)]
pub struct Receiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<Handoff<T>>>>,
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T: Send> Receiver<T> {
    /// Receives the next value.
    ///
    /// Returns [`None`] once the channel is closed and no value is left, immediately for every
    /// pending and future call. Dropping this future before it resolves loses no value.
    pub async fn recv(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;

        loop {
            let (value, ack_tx) = rx.recv().await?;

            // A failed acknowledgement means the sender gave up on this hand-off, so the value
            // was never delivered and we wait for the next one.
            if ack_tx.send(()).is_ok() {
                return Some(value);
            }
        }
    }

    /// Converts this receiver into a [`Stream`] of the received values.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send
    where
        T: 'static,
    {
        stream::unfold(self, |rx| async move {
            let value = rx.recv().await?;
            Some((value, rx))
        })
    }
}

/// Creates an unbuffered channel.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    // A single slot holds the hand-off currently waiting for a receiver. The sender stays blocked
    // on the acknowledgement, so the slot never acts as a buffer.
    let (tx, rx) = mpsc::channel(1);

    (
        Sender { tx },
        Receiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}
