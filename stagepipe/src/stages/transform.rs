use std::sync::Arc;

use tracing::debug;

use crate::concurrency::channel::{Receiver, channel};
use crate::stages::{StageContext, pump};
use crate::workers::base::WorkerType;

/// Starts a transform stage applying `f` to every value received from `input`.
///
/// A single worker receives until `input` closes and hands `f(value)` off to the returned channel,
/// which it closes when done. Order is preserved along this worker's path. Once the pipeline is
/// shut down the worker stops both receiving and sending, values it has not received yet are
/// never delivered.
///
/// Calling this several times with clones of the same `input` fans the work out: each value is
/// received by exactly one of the workers, with no ordering guarantee across them.
///
/// `f` is assumed to be pure and total. A panic inside it kills the worker, closes its output and
/// is reported when waiting on the pool.
pub fn transform<T, U, F>(ctx: &StageContext, input: Receiver<T>, f: F) -> Receiver<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> U + Send + 'static,
{
    let (tx, rx) = channel();
    let mut shutdown_rx = ctx.shutdown_rx();

    ctx.spawn(WorkerType::Transform, async move {
        let (exit, sent) = pump(input, &tx, f, &mut shutdown_rx).await;
        debug!(%exit, sent, "transform finished");

        // Dropping the only sender closes the output on every exit path.
        drop(tx);
    });

    rx
}

/// Starts `workers` transform workers sharing `input` and `f`.
///
/// Returns one output channel per worker, ready to be merged. With zero workers nothing consumes
/// `input` and an empty list is returned.
pub fn fan_out<T, U, F>(
    ctx: &StageContext,
    input: Receiver<T>,
    workers: usize,
    f: F,
) -> Vec<Receiver<U>>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
{
    let f = Arc::new(f);

    (0..workers)
        .map(|_| {
            let f = Arc::clone(&f);
            transform(ctx, input.clone(), move |value| f(value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use futures::StreamExt;

    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;
    use crate::error::ErrorKind;
    use crate::stages::{merge, source};
    use crate::test_utils::wait_with_timeout;
    use crate::workers::pool::WorkerPool;

    #[tokio::test]
    async fn applies_the_function_preserving_order() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());

        let numbers = source(&ctx, [15_i64, 2, 9, 23, 91]);
        let squares: Vec<i64> = transform(&ctx, numbers, |n| n * n)
            .into_stream()
            .collect()
            .await;

        assert_eq!(squares, vec![225, 4, 81, 529, 8281]);
        wait_with_timeout(ctx.pool().wait_all()).await.unwrap();
    }

    #[tokio::test]
    async fn can_change_the_value_type() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());

        let numbers = source(&ctx, [1_u8, 2, 3]);
        let labels: Vec<String> = transform(&ctx, numbers, |n| format!("#{n}"))
            .into_stream()
            .collect()
            .await;

        assert_eq!(labels, vec!["#1", "#2", "#3"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fan_out_transforms_every_value_exactly_once() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());
        let calls = Arc::new(Mutex::new(HashMap::<u32, usize>::new()));

        let numbers = source(&ctx, 0..500_u32);
        let outputs = fan_out(&ctx, numbers, 4, {
            let calls = Arc::clone(&calls);
            move |n| {
                *calls.lock().unwrap().entry(n).or_default() += 1;
                n
            }
        });
        assert_eq!(outputs.len(), 4);

        let mut values: Vec<u32> = merge(&ctx, outputs).into_stream().collect().await;
        values.sort_unstable();

        assert_eq!(values, (0..500).collect::<Vec<_>>());
        wait_with_timeout(ctx.pool().wait_all()).await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 500);
        assert!(calls.values().all(|count| *count == 1));
    }

    #[tokio::test]
    async fn fan_out_with_zero_workers_starts_nothing() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());
        let (_tx, rx) = channel::<u32>();

        let outputs = fan_out(&ctx, rx, 0, |n| n);

        assert!(outputs.is_empty());
        assert_eq!(ctx.pool().active(), 0);
    }

    #[tokio::test]
    async fn shutdown_stops_a_worker_blocked_on_send() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());

        let numbers = source(&ctx, 0..100_u32);
        let doubled = transform(&ctx, numbers, |n| n * 2);
        assert_eq!(doubled.recv().await, Some(0));

        shutdown_tx.shutdown();

        wait_with_timeout(ctx.pool().wait_all()).await.unwrap();
        assert_eq!(ctx.pool().active(), 0);
        assert_eq!(wait_with_timeout(doubled.recv()).await, None);
    }

    #[tokio::test]
    async fn shutdown_stops_a_worker_blocked_on_receive() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());

        // Keep the input open without ever sending anything.
        let (_input_tx, input_rx) = channel::<u32>();
        let output = transform(&ctx, input_rx, |n| n);

        shutdown_tx.shutdown();

        wait_with_timeout(ctx.pool().wait_all()).await.unwrap();
        assert_eq!(wait_with_timeout(output.recv()).await, None);
    }

    #[tokio::test]
    async fn panicking_function_closes_the_output_and_is_reported() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());

        let numbers = source(&ctx, [1_u32, 2, 3]);
        let output = transform(&ctx, numbers, |n: u32| -> u32 {
            if n == 2 {
                panic!("cannot handle two");
            }
            n
        });

        let values: Vec<u32> = output.into_stream().collect().await;
        assert_eq!(values, vec![1]);

        // The dead worker dropped the only input receiver, so the source disconnects too.
        let err = wait_with_timeout(ctx.pool().wait_all()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StageWorkerPanic);
        assert!(err.detail().unwrap().contains("cannot handle two"));
        assert_eq!(ctx.pool().active(), 0);
    }
}
