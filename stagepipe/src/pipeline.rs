use std::sync::Arc;

use stagepipe_config::shared::PipelineConfig;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::bail;
use crate::concurrency::shutdown::{ShutdownGuard, ShutdownTx, create_shutdown_channel};
use crate::error::{ErrorKind, PipelineResult};
use crate::stages::{StageContext, fan_out, merge, sink, source};
use crate::workers::pool::WorkerPool;

/// Owner of a set of stages sharing one shutdown signal and one worker pool.
///
/// The shutdown signal exists before any stage is built, every stage receives it through
/// [`Pipeline::context`]. Dropping the pipeline triggers it, so no worker outlives its owner for
/// longer than one in-flight operation.
#[derive(Debug)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    shutdown_tx: ShutdownTx,
    pool: WorkerPool,
    _shutdown_guard: ShutdownGuard,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;

        // The receiver is not kept, stages subscribe through `shutdown_tx` when they are built.
        let (shutdown_tx, _) = create_shutdown_channel();
        let shutdown_guard = shutdown_tx.guard();

        Ok(Self {
            config: Arc::new(config),
            shutdown_tx,
            pool: WorkerPool::new(),
            _shutdown_guard: shutdown_guard,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the context stage constructors use to start their workers.
    pub fn context(&self) -> StageContext {
        StageContext::new(self.shutdown_tx.subscribe(), self.pool.clone())
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Returns `true` once the pipeline was shut down.
    ///
    /// A stage output that closed while this is `false` closed because its input was exhausted. If
    /// it is `true` the data may have been truncated.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_tx.is_shutdown()
    }

    pub fn active_workers(&self) -> usize {
        self.pool.active()
    }

    /// Signals every worker to stop. Calling it more than once has no further effect.
    pub fn shutdown(&self) {
        if self.shutdown_tx.shutdown() {
            info!(active_workers = self.pool.active(), "shut down signal sent to all workers");
        }
    }

    /// Waits for every worker spawned so far to exit.
    ///
    /// Worker panics are aggregated into a single error.
    pub async fn wait(&self) -> PipelineResult<()> {
        info!(active_workers = self.pool.active(), "waiting for pipeline workers to complete");

        let result = self.pool.wait_all().await;
        if let Err(err) = &result {
            warn!(failed_workers = err.kinds().len(), "pipeline workers failed");
        }

        result
    }

    /// Shuts the pipeline down and waits for its workers, at most for the configured shutdown
    /// timeout.
    ///
    /// Workers still running when the timeout elapses are aborted.
    pub async fn shutdown_and_wait(&self) -> PipelineResult<()> {
        self.shutdown();

        let shutdown_timeout = self.config.shutdown_timeout();
        match timeout(shutdown_timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => {
                let active_workers = self.pool.active();
                warn!(
                    active_workers,
                    timeout_ms = self.config.shutdown_timeout_ms,
                    "pipeline workers did not exit before the shutdown timeout"
                );

                bail!(
                    ErrorKind::ShutdownTimeout,
                    "Pipeline workers did not exit in time",
                    format!("{active_workers} workers still active after {shutdown_timeout:?}")
                );
            }
        }
    }

    /// Squares every value across the configured number of transform workers and sums the
    /// squares.
    ///
    /// If the pipeline is shut down while running, the sum of the squares computed so far is
    /// returned; check [`Pipeline::is_shutdown`] to tell the two apart.
    pub async fn square_sum<I>(&self, values: I) -> PipelineResult<i64>
    where
        I: IntoIterator<Item = i64>,
        I::IntoIter: Send + 'static,
    {
        if self.is_shutdown() {
            bail!(ErrorKind::InvalidState, "Pipeline was already shut down");
        }

        let ctx = self.context();
        let numbers = source(&ctx, values);
        let squares = fan_out(&ctx, numbers, self.config.fan_out, square);
        let total = sink(&ctx, merge(&ctx, squares), 0, i64::saturating_add);

        let result = total.recv().await;
        self.wait().await?;

        match result {
            Some(total) => {
                info!(total, "square sum computed");
                Ok(total)
            }
            None => bail!(
                ErrorKind::InvalidState,
                "Sink closed without emitting a result"
            ),
        }
    }

    /// Squares `values` across the configured number of transform workers, keeps only the first
    /// `take` squares produced and then shuts the pipeline down.
    ///
    /// Fewer values are returned if the input runs out first. Which squares come first is up to
    /// the scheduling of the transform workers.
    pub async fn take_squares<I>(self, values: I, take: usize) -> PipelineResult<Vec<i64>>
    where
        I: IntoIterator<Item = i64>,
        I::IntoIter: Send + 'static,
    {
        let ctx = self.context();
        let numbers = source(&ctx, values);
        let squares = merge(&ctx, fan_out(&ctx, numbers, self.config.fan_out, square));

        let mut taken = Vec::new();
        while taken.len() < take {
            let Some(value) = squares.recv().await else {
                break;
            };

            taken.push(value);
        }

        info!(taken = taken.len(), "stopped consuming squares");
        self.shutdown_and_wait().await?;

        Ok(taken)
    }
}

fn square(n: i64) -> i64 {
    n.saturating_mul(n)
}
