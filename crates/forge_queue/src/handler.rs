//! Job handler contract.

use async_trait::async_trait;
use thiserror::Error;

use crate::job::Job;

/// Failure reported by a job handler.
///
/// A handler error triggers the queue's retry/backoff policy; after
/// `max_attempts` the job is marked failed with this message attached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct JobError {
    pub message: String,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Consumer of jobs from one queue.
///
/// Handlers must be idempotent: the queue guarantees at-least-once
/// execution, not exactly-once.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job) -> Result<(), JobError>;
}
