//! Error types for the pipeline.

use thiserror::Error;

use crate::run::Stage;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur during pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No pipeline run for project: {0}")]
    RunNotFound(String),

    #[error("Project {0} already has an active pipeline run")]
    RunAlreadyActive(String),

    #[error("Invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("Queue error: {0}")]
    Queue(#[from] forge_queue::QueueError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
