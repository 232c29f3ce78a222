use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{PipelineConfig, ValidationError};

/// Complete configuration of the runner binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunnerConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Values emitted by the source stage, in order.
    #[serde(default)]
    pub input: Vec<i64>,
    /// When set, only the first `take` squares are read and the pipeline is then shut down,
    /// instead of summing every square.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<usize>,
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pipeline.validate()
    }
}

impl Config for RunnerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["input"];
}
