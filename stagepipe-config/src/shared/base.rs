use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A pipeline needs at least one transform worker.
    #[error("`fan_out` cannot be zero")]
    FanOutZero,
    /// A zero shutdown timeout would fail every shutdown.
    #[error("`shutdown_timeout_ms` cannot be zero")]
    ShutdownTimeoutZero,
}
