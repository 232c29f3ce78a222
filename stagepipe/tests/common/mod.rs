#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use stagepipe::pipeline::Pipeline;
use stagepipe_config::shared::PipelineConfig;
use tokio::time::timeout;

/// Every worker is expected to exit within milliseconds once cancelled, so this only trips on
/// leaked workers.
pub const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn within_timeout<F>(future: F) -> F::Output
where
    F: Future,
{
    timeout(EXIT_TIMEOUT, future)
        .await
        .expect("operation did not complete in time, a worker is likely stuck")
}

pub fn create_pipeline(fan_out: usize) -> Pipeline {
    Pipeline::new(PipelineConfig {
        fan_out,
        shutdown_timeout_ms: EXIT_TIMEOUT.as_millis() as u64,
    })
    .expect("valid pipeline config")
}

pub fn square(n: i64) -> i64 {
    n * n
}
