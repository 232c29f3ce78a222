use std::ops::Add;

use tracing::debug;

use crate::concurrency::channel::{Receiver, channel};
use crate::stages::StageContext;
use crate::workers::base::WorkerType;

/// Starts a sink stage folding every value of `input` into a single result.
///
/// The worker reduces values with `reduce` starting from `init` until `input` closes, then emits
/// the accumulated value exactly once on the returned channel and closes it.
///
/// The sink does not race shutdown itself: when the pipeline is shut down its upstream closes and
/// the sink emits the partial result. If the result receiver is dropped, the result is discarded.
pub fn sink<T, A, F>(ctx: &StageContext, input: Receiver<T>, init: A, mut reduce: F) -> Receiver<A>
where
    T: Send + 'static,
    A: Send + 'static,
    F: FnMut(A, T) -> A + Send + 'static,
{
    let (tx, rx) = channel();

    ctx.spawn(WorkerType::Sink, async move {
        let mut acc = init;
        let mut received = 0usize;

        while let Some(value) = input.recv().await {
            acc = reduce(acc, value);
            received += 1;
        }

        let delivered = tx.send(acc).await.is_ok();
        debug!(received, delivered, "sink finished");

        drop(tx);
    });

    rx
}

/// Starts a sink summing every value of `input`, emitting zero for an empty input.
pub fn sum<T>(ctx: &StageContext, input: Receiver<T>) -> Receiver<T>
where
    T: Add<Output = T> + Default + Send + 'static,
{
    sink(ctx, input, T::default(), |acc, value| acc + value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;
    use crate::stages::source;
    use crate::test_utils::wait_with_timeout;
    use crate::workers::pool::WorkerPool;

    #[tokio::test]
    async fn sums_every_value_and_emits_once() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());

        let total = sum(&ctx, source(&ctx, [225_i64, 4, 81, 529, 8281]));

        assert_eq!(total.recv().await, Some(9120));
        assert_eq!(wait_with_timeout(total.recv()).await, None);
        wait_with_timeout(ctx.pool().wait_all()).await.unwrap();
    }

    #[tokio::test]
    async fn empty_input_emits_the_initial_value() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());

        let total = sum(&ctx, source(&ctx, Vec::<i64>::new()));

        assert_eq!(total.recv().await, Some(0));
        assert_eq!(wait_with_timeout(total.recv()).await, None);
    }

    #[tokio::test]
    async fn folds_with_a_custom_reducer() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());

        let words = source(&ctx, ["stage", "pipe", "line"]);
        let joined = sink(&ctx, words, String::new(), |mut acc, word| {
            acc.push_str(word);
            acc
        });

        assert_eq!(joined.recv().await.as_deref(), Some("stagepipeline"));
    }

    #[tokio::test]
    async fn emits_a_partial_result_when_the_input_is_cut_short() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());

        // Stands in for an upstream stage that gets cancelled halfway through.
        let (input_tx, input_rx) = channel::<u64>();
        let total = sum(&ctx, input_rx);
        input_tx.send(5).await.unwrap();
        input_tx.send(7).await.unwrap();

        drop(input_tx);

        assert_eq!(wait_with_timeout(total.recv()).await, Some(12));
        wait_with_timeout(ctx.pool().wait_all()).await.unwrap();
    }

    #[tokio::test]
    async fn dropped_result_receiver_does_not_block_the_sink() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let ctx = StageContext::new(shutdown_rx, WorkerPool::new());

        drop(sum(&ctx, source(&ctx, 1..=10_u32)));

        wait_with_timeout(ctx.pool().wait_all()).await.unwrap();
        assert_eq!(ctx.pool().active(), 0);
    }
}
