//! Logging setup shared by stagepipe binaries and tests.

pub mod tracing;
