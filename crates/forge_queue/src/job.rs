//! Job record and retry policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Ready to be claimed by a worker
    Waiting,
    /// Scheduled for a future retry
    Delayed,
    /// Claimed by a worker and executing
    Active,
    /// Finished successfully, retained for inspection
    Completed,
    /// Attempts exhausted, retained for inspection
    Failed,
}

/// Delay policy between retry attempts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum BackoffPolicy {
    /// Same delay before every retry
    Fixed { delay_ms: u64 },
    /// Delay doubles with each completed attempt
    Exponential { base_ms: u64 },
}

impl BackoffPolicy {
    /// Delay before the next attempt, given the number of attempts
    /// already made (1-based: after the first failure `attempts` is 1).
    pub fn delay_for(&self, attempts: u32) -> Duration {
        match self {
            Self::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            Self::Exponential { base_ms } => {
                let shift = attempts.saturating_sub(1).min(16);
                Duration::from_millis(base_ms.saturating_mul(1u64 << shift))
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Exponential { base_ms: 1_000 }
    }
}

/// Per-job options supplied at enqueue time.
///
/// Unset fields fall back to the queue's configured defaults.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    /// Lower value is served first within a queue
    pub priority: Option<u8>,
    pub max_attempts: Option<u32>,
    pub backoff: Option<BackoffPolicy>,
    pub timeout: Option<Duration>,
    /// Threads all jobs of one pipeline run; defaults to the job id
    pub correlation_id: Option<String>,
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// A unit of work on one named queue.
///
/// Identity is the pair `(queue_name, id)`; ids are caller-assigned so
/// that duplicate submission of the same id does not duplicate
/// execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub queue_name: String,
    pub payload: serde_json::Value,
    pub priority: u8,
    /// Number of executions started so far
    pub attempts: u32,
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub correlation_id: String,
    /// Per-job execution timeout in milliseconds, if any
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
}

impl Job {
    /// Whether another retry is allowed after a failure.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Deserialize the payload into a typed value.
    pub fn payload_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff_is_constant() {
        let policy = BackoffPolicy::Fixed { delay_ms: 250 };
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(5), Duration::from_millis(250));
    }

    #[test]
    fn test_exponential_backoff_doubles() {
        let policy = BackoffPolicy::Exponential { base_ms: 100 };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
    }

    #[test]
    fn test_exponential_backoff_does_not_overflow() {
        let policy = BackoffPolicy::Exponential { base_ms: u64::MAX / 2 };
        // Large attempt counts must saturate, not panic
        let _ = policy.delay_for(64);
    }

    #[test]
    fn test_options_builder() {
        let opts = JobOptions::new()
            .priority(2)
            .max_attempts(5)
            .backoff(BackoffPolicy::Fixed { delay_ms: 10 })
            .correlation_id("corr-1");
        assert_eq!(opts.priority, Some(2));
        assert_eq!(opts.max_attempts, Some(5));
        assert_eq!(opts.correlation_id.as_deref(), Some("corr-1"));
    }
}
