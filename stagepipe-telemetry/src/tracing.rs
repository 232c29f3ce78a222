use std::sync::Once;

use stagepipe_config::Environment;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Filter used by tests when `RUST_LOG` is not set.
const DEFAULT_TEST_FILTER: &str = "stagepipe=debug";

static INIT_TEST_TRACING: Once = Once::new();

/// Installs the global tracing subscriber for the application named `app_name`.
///
/// Events are filtered through `RUST_LOG`, defaulting to `info`. In the production environment
/// they are written as JSON lines, otherwise in the human readable format.
pub fn init_tracing(app_name: &str) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let is_prod = matches!(Environment::load(), Ok(Environment::Prod));
    let registry = tracing_subscriber::registry().with(env_filter);

    if is_prod {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    tracing::info!(app_name, "tracing initialized");

    Ok(())
}

/// Installs a subscriber writing through the test harness, once per test binary.
///
/// Later calls are no-ops, so every test can call it unconditionally.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));

        // Another subscriber may already be installed by the test binary itself.
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}
