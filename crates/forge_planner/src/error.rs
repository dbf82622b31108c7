//! Error types for the planning step.

use thiserror::Error;

/// Result type alias for planner operations.
pub type PlannerResult<T> = Result<T, PlannerError>;

/// Errors that can occur during planning.
#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("Prompt rejected: {0}")]
    PromptRejected(String),

    #[error("Model not configured. Set OPENAI_API_KEY or ANTHROPIC_API_KEY")]
    ModelNotConfigured,

    #[error("Model call failed: {0}")]
    Model(String),

    /// Both the original and the corrective attempt produced output
    /// that does not satisfy the specification schema. Terminal: the
    /// caller decides whether to resubmit with a revised prompt.
    #[error("Specification generation failed after {attempts} attempts: {reason}")]
    SpecificationGenerationFailed { attempts: u32, reason: String },
}
