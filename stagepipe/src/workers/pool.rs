use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::error::{ErrorKind, PipelineError, PipelineResult};
use crate::pipeline_error;
use crate::workers::base::{WorkerId, WorkerType};

/// Outcome reported by every pooled task: who it was and whether it panicked.
type WorkerOutcome = (WorkerId, WorkerType, Result<(), String>);

/// Internal state for [`WorkerPool`].
#[derive(Debug, Default)]
struct WorkerPoolInner {
    /// Owns all spawned worker tasks that were not joined yet.
    join_set: JoinSet<WorkerOutcome>,
    /// Identifier handed to the next spawned worker.
    next_id: u64,
}

/// Decrements the active worker count when the worker it belongs to exits.
///
/// Dropped on every exit path of a worker, unwinding included.
#[derive(Debug)]
struct ActiveWorker(Arc<AtomicUsize>);

impl ActiveWorker {
    fn enter(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(active))
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Pool owning every worker spawned by the stages of a pipeline.
///
/// [`WorkerPool`] is what makes leaks observable: it counts the workers that have not exited yet
/// and lets the pipeline owner wait for all of them, turning worker panics into errors.
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
    inner: Arc<Mutex<WorkerPoolInner>>,
    /// Failures of every worker joined so far. Held for the whole of [`WorkerPool::wait_all`], so
    /// concurrent waiters join one at a time.
    failures: Arc<AsyncMutex<Vec<PipelineError>>>,
    active: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Creates a new empty worker pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `future` as a worker of the given type.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, worker_type: WorkerType, future: F) -> WorkerId
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let active = ActiveWorker::enter(&self.active);

        let mut inner = self.lock();
        let worker_id = WorkerId(inner.next_id);
        inner.next_id += 1;

        inner.join_set.spawn(async move {
            let _active = active;

            debug!(%worker_id, %worker_type, "worker started");
            let result = AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .map_err(panic_message);
            debug!(%worker_id, %worker_type, "worker exited");

            (worker_id, worker_type, result)
        });

        worker_id
    }

    /// Returns the number of workers that have not exited yet.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Waits for every worker, including the ones spawned while waiting, to complete.
    ///
    /// Panics of individual workers are collected and returned as a single aggregated error. Every
    /// caller sees every failure recorded so far, whichever caller joined the failed worker.
    /// Concurrent callers are served one after the other, none of them returns before the pool is
    /// drained.
    ///
    /// If the returned future is dropped before completion, the workers it was waiting for are
    /// aborted.
    pub async fn wait_all(&self) -> PipelineResult<()> {
        let mut failures = self.failures.lock().await;

        loop {
            let mut join_set = std::mem::take(&mut self.lock().join_set);
            if join_set.is_empty() {
                break;
            }

            while let Some(result) = join_set.join_next().await {
                match result {
                    Ok((worker_id, worker_type, Ok(()))) => {
                        debug!(%worker_id, %worker_type, "worker joined");
                    }
                    Ok((worker_id, worker_type, Err(message))) => {
                        error!(%worker_id, %worker_type, %message, "worker panicked");
                        failures.push(pipeline_error!(
                            ErrorKind::StageWorkerPanic,
                            "Stage worker panicked",
                            format!("{worker_type} worker {worker_id}: {message}")
                        ));
                    }
                    Err(join_err) => {
                        if join_err.is_cancelled() {
                            debug!("worker task was cancelled");
                        } else {
                            failures.push(pipeline_error!(
                                ErrorKind::StageWorkerPanic,
                                "Stage worker task failed",
                                join_err
                            ));
                        }
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.clone().into())
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkerPoolInner> {
        // Nothing panics while holding the lock, but a poisoned pool is still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Extracts a printable message from a panic payload.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_owned();
    }

    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }

    "unknown panic payload".to_owned()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::test_utils::wait_with_timeout;

    #[tokio::test]
    async fn wait_all_on_an_empty_pool_returns_immediately() {
        let pool = WorkerPool::new();

        wait_with_timeout(pool.wait_all()).await.unwrap();
        assert_eq!(pool.active(), 0);
    }

    #[tokio::test]
    async fn active_counts_workers_until_they_exit() {
        let pool = WorkerPool::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        pool.spawn(WorkerType::Source, async move {
            let _ = release_rx.await;
        });
        assert_eq!(pool.active(), 1);

        release_tx.send(()).unwrap();
        wait_with_timeout(pool.wait_all()).await.unwrap();
        assert_eq!(pool.active(), 0);
    }

    #[tokio::test]
    async fn worker_ids_are_unique() {
        let pool = WorkerPool::new();

        let first = pool.spawn(WorkerType::Transform, async {});
        let second = pool.spawn(WorkerType::Transform, async {});

        assert_ne!(first, second);
        wait_with_timeout(pool.wait_all()).await.unwrap();
    }

    #[tokio::test]
    async fn panics_are_reported_as_errors() {
        let pool = WorkerPool::new();

        pool.spawn(WorkerType::Sink, async {
            panic!("reducer failed");
        });
        pool.spawn(WorkerType::Source, async {});

        let err = wait_with_timeout(pool.wait_all()).await.unwrap_err();
        assert_eq!(err.kinds(), vec![ErrorKind::StageWorkerPanic]);
        let detail = err.detail().unwrap();
        assert!(detail.contains("sink"));
        assert!(detail.contains("reducer failed"));
        assert_eq!(pool.active(), 0);
    }

    #[tokio::test]
    async fn workers_spawned_while_waiting_are_awaited() {
        let pool = WorkerPool::new();
        let nested_pool = pool.clone();
        let (done_tx, done_rx) = oneshot::channel();

        pool.spawn(WorkerType::Source, async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            nested_pool.spawn(WorkerType::Sink, async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let _ = done_tx.send(());
            });
        });

        wait_with_timeout(pool.wait_all()).await.unwrap();
        assert!(done_rx.await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_waiters_both_wait_for_every_worker() {
        let pool = WorkerPool::new();

        pool.spawn(WorkerType::Transform, async {
            tokio::time::sleep(Duration::from_millis(300)).await;
        });

        let first = tokio::spawn({
            let pool = pool.clone();
            async move {
                let result = pool.wait_all().await;
                (result, pool.active())
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        wait_with_timeout(pool.wait_all()).await.unwrap();
        assert_eq!(pool.active(), 0);

        let (result, active) = wait_with_timeout(first).await.unwrap();
        result.unwrap();
        assert_eq!(active, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn every_waiter_sees_worker_panics() {
        let pool = WorkerPool::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        pool.spawn(WorkerType::Sink, async move {
            let _ = release_rx.await;
            panic!("reducer failed");
        });

        let first = tokio::spawn({
            let pool = pool.clone();
            async move { pool.wait_all().await }
        });
        let second = tokio::spawn({
            let pool = pool.clone();
            async move { pool.wait_all().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        release_tx.send(()).unwrap();

        for waiter in [first, second] {
            let err = wait_with_timeout(waiter).await.unwrap().unwrap_err();
            assert_eq!(err.kinds(), vec![ErrorKind::StageWorkerPanic]);
        }

        // Later waiters still see the failure.
        let err = wait_with_timeout(pool.wait_all()).await.unwrap_err();
        assert!(err.detail().unwrap().contains("reducer failed"));
    }
}
