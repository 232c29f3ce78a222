//! Macros for pipeline error handling.
//!
//! Provides convenience macros for creating and returning [`crate::error::PipelineError`]
//! instances with reduced boilerplate.

/// Creates a [`crate::error::PipelineError`] from error kind and description.
///
/// Accepts an optional dynamic detail, anything implementing [`ToString`].
#[macro_export]
macro_rules! pipeline_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::PipelineError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::PipelineError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates and returns a [`crate::error::PipelineError`] from the current function.
///
/// Supports the same optional detail argument as [`pipeline_error!`].
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return ::core::result::Result::Err($crate::pipeline_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return ::core::result::Result::Err($crate::pipeline_error!($kind, $desc, $detail))
    };
}
