//! Helpers for tests exercising pipelines.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

/// Default timeout for waiting on workers in tests.
///
/// Every worker is expected to exit within milliseconds once its inputs close or the pipeline is
/// shut down, so hitting this timeout means a worker leaked.
pub const DEFAULT_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Awaits `future` for at most [`DEFAULT_EXIT_TIMEOUT`].
///
/// # Panics
///
/// Panics if the timeout elapses first, so tests fail fast instead of hanging.
pub async fn wait_with_timeout<F>(future: F) -> F::Output
where
    F: Future,
{
    match timeout(DEFAULT_EXIT_TIMEOUT, future).await {
        Ok(output) => output,
        Err(_) => panic!(
            "Test wait timed out after {DEFAULT_EXIT_TIMEOUT:?}. \
             This likely indicates a worker that never exited."
        ),
    }
}
