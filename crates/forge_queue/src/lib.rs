//! # forge_queue
//!
//! Durable named job queues for the AppForge pipeline.
//!
//! Each queue carries its own configuration (concurrency, attempts,
//! backoff, timeout, retention) so that a slow, expensive stage such
//! as full-application generation cannot starve cheap stages such as
//! notifications. Jobs are typed payloads with caller-assigned ids;
//! re-submitting an existing id is a no-op, which gives producers safe
//! at-least-once retry semantics on their own submission path.
//!
//! Execution is at-least-once: handlers must be idempotent. The queue
//! guarantees atomic claim-for-processing, so no two workers ever run
//! the same job concurrently.

pub mod error;
pub mod handler;
pub mod job;
pub mod queue;
pub mod registry;

pub use error::{QueueError, QueueResult};
pub use handler::{JobError, JobHandler};
pub use job::{BackoffPolicy, Job, JobOptions, JobStatus};
pub use queue::{EnqueueOutcome, JobQueue, QueueConfig, QueueCounts};
pub use registry::{priority, QueueKind, QueueRegistry};
