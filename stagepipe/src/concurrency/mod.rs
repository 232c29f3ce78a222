//! Concurrency primitives the pipeline stages are built from.
//!
//! - [`channel`] provides the unbuffered hand-off channels connecting stages. Cloned receivers
//!   share one queue, which is what makes fan-out possible.
//! - [`shutdown`] provides the cancellation signal every stage races its blocking operations
//!   against, so no worker stays blocked once the pipeline is shut down.
//! - [`barrier`] provides the completion barrier used by fan-in to close the merged channel
//!   exactly once, after every forwarding worker is gone.

pub mod barrier;
pub mod channel;
pub mod shutdown;
