use tracing::debug;

use crate::concurrency::channel::{Receiver, channel};
use crate::concurrency::shutdown::ShutdownResult;
use crate::stages::{StageContext, StageExit};
use crate::workers::base::WorkerType;

/// Starts a source stage emitting `values` in order.
///
/// A single worker hands every value off to the returned channel, then closes it. If the pipeline
/// is shut down first, the remaining values are never sent and the channel is closed right away;
/// this is a normal early termination, not an error.
///
/// `values` is iterated lazily by the worker, one value per hand-off, so it may be unbounded.
pub fn source<T, I>(ctx: &StageContext, values: I) -> Receiver<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = T>,
    I::IntoIter: Send + 'static,
{
    let values = values.into_iter();
    let (tx, rx) = channel();
    let mut shutdown_rx = ctx.shutdown_rx();

    ctx.spawn(WorkerType::Source, async move {
        let mut sent = 0;
        let mut exit = StageExit::Drained;

        for value in values {
            match shutdown_rx.run_until_cancelled(tx.send(value)).await {
                ShutdownResult::Ok(Ok(())) => sent += 1,
                ShutdownResult::Ok(Err(_)) => {
                    exit = StageExit::Disconnected;
                    break;
                }
                ShutdownResult::Shutdown(()) => {
                    exit = StageExit::Cancelled;
                    break;
                }
            }
        }

        debug!(%exit, sent, "source finished");

        // Dropping the only sender closes the output on every exit path.
        drop(tx);
    });

    rx
}
