//! Completion barrier gating a single follow-up action on a group of workers.
//!
//! The barrier starts with a count of outstanding workers. Each worker holds a [`BarrierToken`]
//! and dropping the token, on whatever path the worker exits, decrements the count. Whoever waits
//! on the [`CompletionBarrier`] is released once the count reaches zero.

use std::sync::Arc;

use tokio::sync::watch;

/// Waiting side of the barrier.
#[derive(Debug)]
pub struct CompletionBarrier {
    remaining: watch::Receiver<usize>,
}

impl CompletionBarrier {
    /// Creates a barrier tracking `count` workers, returning one token per worker.
    ///
    /// A barrier created with a count of zero is satisfied right away.
    pub fn new(count: usize) -> (Self, Vec<BarrierToken>) {
        let (tx, rx) = watch::channel(count);
        let tx = Arc::new(tx);

        let tokens = (0..count)
            .map(|_| BarrierToken {
                remaining: Arc::clone(&tx),
            })
            .collect();

        (Self { remaining: rx }, tokens)
    }

    /// Waits until every token has been dropped.
    pub async fn wait(&mut self) {
        // The sender is dropped together with the last token, which happens only after the count
        // reached zero, so a closed channel also means the barrier is satisfied.
        loop {
            let remaining = *self.remaining.borrow_and_update();
            if remaining == 0 {
                return;
            }

            if self.remaining.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Membership of one worker in a [`CompletionBarrier`]; dropping it marks the worker as done.
#[derive(Debug)]
#[must_use = "dropping the token immediately marks the worker as done"]
pub struct BarrierToken {
    remaining: Arc<watch::Sender<usize>>,
}

impl Drop for BarrierToken {
    fn drop(&mut self) {
        self.remaining
            .send_modify(|remaining| *remaining = remaining.saturating_sub(1));
    }
}
