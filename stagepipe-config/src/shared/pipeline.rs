use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

const fn default_fan_out() -> usize {
    PipelineConfig::DEFAULT_FAN_OUT
}

const fn default_shutdown_timeout_ms() -> u64 {
    PipelineConfig::DEFAULT_SHUTDOWN_TIMEOUT_MS
}

/// Configuration of a pipeline.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Number of transform workers sharing the source output.
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,
    /// How long shutting down may take before the remaining workers are aborted.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

impl PipelineConfig {
    pub const DEFAULT_FAN_OUT: usize = 2;

    pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validates the pipeline configuration.
    ///
    /// Checks that at least one transform worker is configured and the shutdown timeout is
    /// non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.fan_out == 0 {
            return Err(ValidationError::FanOutZero);
        }

        if self.shutdown_timeout_ms == 0 {
            return Err(ValidationError::ShutdownTimeoutZero);
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fan_out: Self::DEFAULT_FAN_OUT,
            shutdown_timeout_ms: Self::DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();

        assert_eq!(config.fan_out, 2);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_values() {
        let zero_fan_out = PipelineConfig {
            fan_out: 0,
            ..Default::default()
        };
        let zero_timeout = PipelineConfig {
            shutdown_timeout_ms: 0,
            ..Default::default()
        };

        assert_eq!(zero_fan_out.validate(), Err(ValidationError::FanOutZero));
        assert_eq!(zero_timeout.validate(), Err(ValidationError::ShutdownTimeoutZero));
    }
}
