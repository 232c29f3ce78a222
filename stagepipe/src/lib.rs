//! Staged concurrent pipelines built from cancellable workers.
//!
//! A pipeline is a chain of stages connected by rendezvous channels: a [`stages::source()`] emits
//! a finite sequence of values, [`stages::transform()`] workers map them, possibly fanned out
//! across several workers sharing the same input, [`stages::merge()`] joins several channels back
//! into one and [`stages::sink()`] reduces everything to a single result.
//!
//! Every stage worker honours a shared shutdown signal owned by [`pipeline::Pipeline`]. Once it is
//! triggered, each worker gives up its pending channel operation and exits, closing its output,
//! so a consumer can stop reading at any point without leaking workers.

pub mod concurrency;
pub mod error;
mod macros;
pub mod pipeline;
pub mod stages;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod workers;
