use tracing::debug;

use crate::concurrency::barrier::CompletionBarrier;
use crate::concurrency::channel::{Receiver, channel};
use crate::stages::{StageContext, pump};
use crate::workers::base::WorkerType;

/// Starts a merge stage combining `inputs` into a single channel.
///
/// One forwarding worker per input moves values to the returned channel until its input closes or
/// the pipeline is shut down. Values from the same input keep their relative order; nothing is
/// guaranteed across inputs.
///
/// Forwarders only hold weak senders. The output is closed by a separate coordinator worker, which
/// owns the only strong sender and drops it once every forwarder has exited, so the channel is
/// closed exactly once and only after the last forwarded value. With no inputs the output is
/// closed immediately.
pub fn merge<T>(ctx: &StageContext, inputs: Vec<Receiver<T>>) -> Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = channel();
    let (mut barrier, tokens) = CompletionBarrier::new(inputs.len());

    for (index, (input, token)) in inputs.into_iter().zip(tokens).enumerate() {
        let output = tx.downgrade();
        let mut shutdown_rx = ctx.shutdown_rx();

        ctx.spawn(WorkerType::Forward { input: index }, async move {
            let _token = token;

            let (exit, forwarded) = pump(input, &output, |value| value, &mut shutdown_rx).await;
            debug!(input = index, %exit, forwarded, "forwarder finished");
        });
    }

    ctx.spawn(WorkerType::MergeCoordinator, async move {
        barrier.wait().await;
        debug!("all forwarders finished, closing merged output");

        drop(tx);
    });

    rx
}
