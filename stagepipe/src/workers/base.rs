use std::fmt;

/// Classification of pipeline workers.
///
/// [`WorkerType`] tells apart the different tasks a pipeline spawns. It is attached to every log
/// line a worker emits and to the errors reported for failing workers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WorkerType {
    /// Worker emitting the input sequence of a source stage.
    Source,
    /// Worker applying a function to every value of a transform stage.
    Transform,
    /// Worker forwarding one input of a merge stage into the merged output.
    Forward {
        /// Position of the forwarded input among the merged inputs.
        input: usize,
    },
    /// Worker closing the merged output once every forwarder is done.
    MergeCoordinator,
    /// Worker reducing the input of a sink stage.
    Sink,
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerType::Source => write!(f, "source"),
            WorkerType::Transform => write!(f, "transform"),
            WorkerType::Forward { input } => write!(f, "forward[{input}]"),
            WorkerType::MergeCoordinator => write!(f, "merge_coordinator"),
            WorkerType::Sink => write!(f, "sink"),
        }
    }
}

/// Identifier of a worker, unique within the pool that spawned it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub(crate) u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
