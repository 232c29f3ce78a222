//! Pipeline stages.
//!
//! Every stage constructor takes a [`StageContext`], spawns its workers into the context's pool and
//! returns the receiving end of its output channel right away. Stages are wired together by
//! passing the receiver returned by one constructor as the input of the next:
//!
//! ```text
//! source -> transform (x k workers) -> merge -> sink
//! ```
//!
//! Each output channel is closed by exactly one party: the only worker producing it for
//! [`source()`], [`transform()`] and [`sink()`], and a coordinator gated on a completion barrier for
//! [`merge()`].
//!
//! Downstream stages cannot tell a channel that closed because its input was exhausted from one
//! that closed because the pipeline was shut down: both look like the end of the data. Callers
//! that need to know should ask the pipeline owner, see
//! [`Pipeline::is_shutdown`](crate::pipeline::Pipeline::is_shutdown).

use std::fmt;
use std::future::Future;

use crate::concurrency::channel::{ChannelSender, Receiver};
use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx};
use crate::workers::base::{WorkerId, WorkerType};
use crate::workers::pool::WorkerPool;

mod merge;
mod sink;
mod source;
mod transform;

pub use merge::merge;
pub use sink::{sink, sum};
pub use source::source;
pub use transform::{fan_out, transform};

/// Everything a stage needs to start its workers.
///
/// Cloning the context is cheap; all clones share the same shutdown signal and worker pool.
#[derive(Debug, Clone)]
pub struct StageContext {
    shutdown_rx: ShutdownRx,
    pool: WorkerPool,
}

impl StageContext {
    /// Creates a new [`StageContext`].
    pub fn new(shutdown_rx: ShutdownRx, pool: WorkerPool) -> Self {
        Self { shutdown_rx, pool }
    }

    /// Returns a fresh subscription to the shutdown signal.
    pub fn shutdown_rx(&self) -> ShutdownRx {
        self.shutdown_rx.clone()
    }

    /// Returns the pool the stage workers are spawned into.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    fn spawn<F>(&self, worker_type: WorkerType, future: F) -> WorkerId
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pool.spawn(worker_type, future)
    }
}

/// Reason a stage worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageExit {
    /// The input was closed and every value was handled.
    Drained,
    /// The shutdown signal won a race against a blocking operation.
    Cancelled,
    /// Every receiver of the output is gone.
    Disconnected,
}

impl fmt::Display for StageExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageExit::Drained => write!(f, "drained"),
            StageExit::Cancelled => write!(f, "cancelled"),
            StageExit::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Moves values from `input` to `output`, applying `f` on the way.
///
/// Both the receive and the send are raced against shutdown. Returns why the loop stopped and how
/// many values were handed off downstream.
async fn pump<T, U, S, F>(
    input: Receiver<T>,
    output: &S,
    mut f: F,
    shutdown_rx: &mut ShutdownRx,
) -> (StageExit, usize)
where
    T: Send,
    S: ChannelSender<U>,
    F: FnMut(T) -> U,
{
    let mut forwarded = 0;

    loop {
        let value = match shutdown_rx.run_until_cancelled(input.recv()).await {
            ShutdownResult::Ok(Some(value)) => value,
            ShutdownResult::Ok(None) => return (StageExit::Drained, forwarded),
            ShutdownResult::Shutdown(()) => return (StageExit::Cancelled, forwarded),
        };

        match shutdown_rx.run_until_cancelled(output.send(f(value))).await {
            ShutdownResult::Ok(Ok(())) => forwarded += 1,
            ShutdownResult::Ok(Err(_)) => return (StageExit::Disconnected, forwarded),
            ShutdownResult::Shutdown(()) => return (StageExit::Cancelled, forwarded),
        }
    }
}
