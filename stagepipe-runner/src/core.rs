use stagepipe::concurrency::shutdown::ShutdownTx;
use stagepipe::pipeline::Pipeline;
use stagepipe_config::shared::RunnerConfig;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// What a run of the runner produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutput {
    /// Sum of every square, or of the squares computed before a shutdown when `truncated`.
    Sum { total: i64, truncated: bool },
    /// The first squares read before the pipeline was shut down.
    Taken(Vec<i64>),
}

/// Runs the pipeline described by `runner_config` and prints its result.
///
/// A Ctrl+C (or SIGTERM on Unix) received while running shuts the pipeline down; whatever was
/// computed until then is still printed.
pub async fn start_runner_with_config(runner_config: RunnerConfig) -> anyhow::Result<()> {
    info!(
        fan_out = runner_config.pipeline.fan_out,
        values = runner_config.input.len(),
        take = ?runner_config.take,
        "starting runner"
    );

    let pipeline = Pipeline::new(runner_config.pipeline)?;
    let shutdown_handle = spawn_shutdown_handler(pipeline.shutdown_tx());

    let result = run_pipeline(pipeline, runner_config.input, runner_config.take).await;

    // The handler is still waiting for a signal if the pipeline finished on its own.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    match result? {
        RunOutput::Sum { total, truncated } => {
            if truncated {
                warn!(total, "pipeline was shut down early, the sum is partial");
            }
            println!("{total}");
        }
        RunOutput::Taken(squares) => {
            let squares: Vec<String> = squares.iter().map(i64::to_string).collect();
            println!("{}", squares.join(" "));
        }
    }

    Ok(())
}

/// Squares `input` through `pipeline`, either summing everything or reading only `take` squares.
pub async fn run_pipeline(
    pipeline: Pipeline,
    input: Vec<i64>,
    take: Option<usize>,
) -> anyhow::Result<RunOutput> {
    let output = match take {
        Some(take) => RunOutput::Taken(pipeline.take_squares(input, take).await?),
        None => {
            let total = pipeline.square_sum(input).await?;
            let truncated = pipeline.is_shutdown();
            pipeline.shutdown_and_wait().await?;

            RunOutput::Sum { total, truncated }
        }
    };

    info!(?output, "runner finished");

    Ok(output)
}

fn spawn_shutdown_handler(shutdown_tx: ShutdownTx) -> JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_signal().await;

        info!("shutdown signal received, shutting down pipeline");
        shutdown_tx.shutdown();
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!(error = %err, "failed to register SIGTERM handler, only listening for ctrl+c");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("sigint (ctrl+c) received");
        }
        _ = sigterm.recv() => {
            info!("sigterm received");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("ctrl+c received");
}

#[cfg(test)]
mod tests {
    use stagepipe_config::shared::PipelineConfig;

    use super::*;

    fn pipeline() -> Pipeline {
        Pipeline::new(PipelineConfig::default()).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sums_every_square_without_take() {
        let output = run_pipeline(pipeline(), vec![15, 2, 9, 23, 91], None)
            .await
            .unwrap();

        assert_eq!(
            output,
            RunOutput::Sum {
                total: 9120,
                truncated: false
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reads_only_the_requested_squares_with_take() {
        let output = run_pipeline(pipeline(), vec![15, 2, 9, 23, 91], Some(3))
            .await
            .unwrap();

        let RunOutput::Taken(squares) = output else {
            panic!("expected taken squares, got {output:?}");
        };
        assert_eq!(squares.len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_input_sums_to_zero() {
        let output = run_pipeline(pipeline(), Vec::new(), None).await.unwrap();

        assert_eq!(
            output,
            RunOutput::Sum {
                total: 0,
                truncated: false
            }
        );
    }
}
