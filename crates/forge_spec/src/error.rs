//! Error types for specification handling.

use thiserror::Error;

/// Result type alias for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// Errors that can occur while parsing or validating a specification.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("Specification is not valid JSON: {0}")]
    Parse(String),

    #[error("Specification violates schema: {0}")]
    Invalid(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SpecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
