//! Queue registry owned by the composition root.
//!
//! There is deliberately no process-wide queue cache: the registry is
//! constructed explicitly and injected into producers and consumers,
//! so ownership of every queue is visible at the call site.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QueueError, QueueResult};
use crate::job::BackoffPolicy;
use crate::queue::{JobQueue, QueueConfig, QueueCounts};

/// Job priority values. Lower is served first within a queue.
///
/// Resource-intensive work is deliberately deprioritized below
/// lightweight tasks, and production deployments ahead of previews.
pub mod priority {
    /// Production-environment deployments
    pub const PRODUCTION_DEPLOY: u8 = 1;
    /// Lightweight tasks: notifications, small AI tasks
    pub const LIGHT_TASK: u8 = 3;
    /// Preview-environment deployments
    pub const PREVIEW_DEPLOY: u8 = 4;
    /// Default for unclassified jobs
    pub const DEFAULT: u8 = 5;
    /// Full-application generation, the most expensive job type
    pub const FULL_APP_GENERATION: u8 = 10;
}

/// The named queues the pipeline runs on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Project lifecycle actions (create, archive)
    Lifecycle,
    /// Full-application generation (planning)
    Generation,
    /// Build execution
    Build,
    /// Deployment execution
    Deployment,
    /// Ancillary AI tasks
    AiTasks,
    /// User notifications
    Notifications,
}

impl QueueKind {
    pub const ALL: [QueueKind; 6] = [
        QueueKind::Lifecycle,
        QueueKind::Generation,
        QueueKind::Build,
        QueueKind::Deployment,
        QueueKind::AiTasks,
        QueueKind::Notifications,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lifecycle => "lifecycle",
            Self::Generation => "generation",
            Self::Build => "build",
            Self::Deployment => "deployment",
            Self::AiTasks => "ai-tasks",
            Self::Notifications => "notifications",
        }
    }

    /// Default configuration for this queue.
    ///
    /// Expensive stages get low concurrency and long timeouts; cheap
    /// stages get the opposite, so one cannot starve the other.
    fn default_config(&self) -> QueueConfig {
        let base = QueueConfig::new(self.as_str());
        match self {
            Self::Lifecycle => base.concurrency(4).default_max_attempts(3),
            Self::Generation => base
                .concurrency(2)
                .default_max_attempts(2)
                .default_priority(priority::FULL_APP_GENERATION)
                .job_timeout(Duration::from_secs(300))
                .default_backoff(BackoffPolicy::Exponential { base_ms: 5_000 }),
            Self::Build => base
                .concurrency(2)
                .default_max_attempts(2)
                .job_timeout(Duration::from_secs(600))
                .default_backoff(BackoffPolicy::Exponential { base_ms: 5_000 }),
            Self::Deployment => base
                .concurrency(2)
                .default_max_attempts(3)
                .job_timeout(Duration::from_secs(300))
                .default_backoff(BackoffPolicy::Exponential { base_ms: 2_000 }),
            Self::AiTasks => base
                .concurrency(4)
                .default_priority(priority::LIGHT_TASK)
                .job_timeout(Duration::from_secs(120)),
            Self::Notifications => base
                .concurrency(8)
                .default_priority(priority::LIGHT_TASK)
                .default_max_attempts(5)
                .job_timeout(Duration::from_secs(30))
                .default_backoff(BackoffPolicy::Fixed { delay_ms: 1_000 }),
        }
    }
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicitly constructed set of queues, one per [`QueueKind`].
pub struct QueueRegistry {
    queues: HashMap<QueueKind, Arc<JobQueue>>,
}

impl QueueRegistry {
    /// Build a registry with the default per-kind configurations.
    pub fn with_defaults() -> Self {
        let mut builder = Self::builder();
        for kind in QueueKind::ALL {
            builder = builder.queue(kind, kind.default_config());
        }
        builder.build()
    }

    pub fn builder() -> QueueRegistryBuilder {
        QueueRegistryBuilder {
            configs: HashMap::new(),
        }
    }

    /// Get the queue for a kind.
    pub fn queue(&self, kind: QueueKind) -> QueueResult<Arc<JobQueue>> {
        self.queues
            .get(&kind)
            .cloned()
            .ok_or_else(|| QueueError::QueueNotFound(kind.as_str().to_string()))
    }

    /// Aggregate counts for every queue, in declaration order.
    pub fn counts(&self) -> Vec<(QueueKind, QueueCounts)> {
        QueueKind::ALL
            .iter()
            .filter_map(|kind| self.queues.get(kind).map(|q| (*kind, q.counts())))
            .collect()
    }

    /// Shut down every queue's workers.
    pub fn shutdown_all(&self) {
        for queue in self.queues.values() {
            queue.shutdown();
        }
    }
}

/// Builder allowing per-queue configuration overrides.
pub struct QueueRegistryBuilder {
    configs: HashMap<QueueKind, QueueConfig>,
}

impl QueueRegistryBuilder {
    pub fn queue(mut self, kind: QueueKind, config: QueueConfig) -> Self {
        self.configs.insert(kind, config);
        self
    }

    pub fn build(self) -> QueueRegistry {
        let queues = self
            .configs
            .into_iter()
            .map(|(kind, config)| (kind, JobQueue::new(config)))
            .collect();
        QueueRegistry { queues }
    }
}
