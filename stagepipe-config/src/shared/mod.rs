//! Configuration types shared by the pipeline library and the runner.

mod base;
mod pipeline;
mod runner;

pub use base::ValidationError;
pub use pipeline::PipelineConfig;
pub use runner::RunnerConfig;
