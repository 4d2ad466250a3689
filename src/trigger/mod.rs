mod comment;
mod engine;
mod refs;
mod target;
mod variables;
mod versions;
mod watch;

pub use engine::{PipelineTrigger, TriggerOutcome};
pub use target::Target;

/// The downstream pipeline an invocation created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineHandle {
    /// Identifier on the downstream host
    pub id: u64,
    /// Browser URL of the pipeline
    pub url: String,
}

/// A named job resolved inside the created pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Identifier on the downstream host
    pub id: u64,
    /// Job name as defined downstream
    pub name: String,
}
