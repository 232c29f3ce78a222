//! Runner binary squaring a list of numbers through a staged pipeline.
//!
//! Loads the configuration, applies command line overrides, and either prints the sum of the
//! squares or the first few squares produced. Ctrl+C shuts the pipeline down gracefully.

use clap::Parser;
use stagepipe_telemetry::tracing::init_tracing;

use crate::config::{Args, load_runner_config};
use crate::core::start_runner_with_config;

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(env!("CARGO_BIN_NAME"))?;

    let runner_config = load_runner_config(args)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_runner_with_config(runner_config))
}
