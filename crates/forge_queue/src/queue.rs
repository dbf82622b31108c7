//! A single named job queue with bounded workers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::handler::{JobError, JobHandler};
use crate::job::{BackoffPolicy, Job, JobOptions, JobStatus};

/// How long an idle worker sleeps before re-checking for work when no
/// delayed job gives a nearer wakeup.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Outcome of an enqueue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The job was added to the queue
    Accepted,
    /// A job with this id is already known; nothing was added
    Duplicate,
}

/// Aggregate queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueCounts {
    pub waiting: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub delayed: usize,
}

/// Configuration for one named queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub name: String,
    /// Maximum jobs executing concurrently on this queue
    pub concurrency: usize,
    pub default_priority: u8,
    pub default_max_attempts: u32,
    pub default_backoff: BackoffPolicy,
    /// Applied to jobs that do not set their own timeout
    pub job_timeout: Option<Duration>,
    /// How long settled jobs stay inspectable before being purged
    pub completed_retention: Duration,
    pub failed_retention: Duration,
}

impl QueueConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            concurrency: 2,
            default_priority: 5,
            default_max_attempts: 3,
            default_backoff: BackoffPolicy::default(),
            job_timeout: None,
            completed_retention: Duration::from_secs(300),
            failed_retention: Duration::from_secs(3_600),
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn default_priority(mut self, priority: u8) -> Self {
        self.default_priority = priority;
        self
    }

    pub fn default_max_attempts(mut self, max_attempts: u32) -> Self {
        self.default_max_attempts = max_attempts.max(1);
        self
    }

    pub fn default_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.default_backoff = backoff;
        self
    }

    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    pub fn completed_retention(mut self, retention: Duration) -> Self {
        self.completed_retention = retention;
        self
    }

    pub fn failed_retention(mut self, retention: Duration) -> Self {
        self.failed_retention = retention;
        self
    }
}

struct WaitingEntry {
    seq: u64,
    job: Job,
}

struct DelayedEntry {
    ready_at: Instant,
    seq: u64,
    job: Job,
}

struct SettledEntry {
    settled_at: Instant,
    job: Job,
}

#[derive(Default)]
struct QueueState {
    waiting: Vec<WaitingEntry>,
    delayed: Vec<DelayedEntry>,
    active: HashMap<String, Job>,
    completed: HashMap<String, SettledEntry>,
    failed: HashMap<String, SettledEntry>,
    /// Every id the queue still knows about, across all states
    known: HashSet<String>,
    paused: bool,
    shutdown: bool,
    next_seq: u64,
}

/// A named queue holding typed job payloads.
///
/// The internal lock is the single source of truth for job state:
/// claiming moves a job into `active` before the lock is released, so
/// claim-for-processing is atomic across workers. All administrative
/// operations are safe to call concurrently with processing.
pub struct JobQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl JobQueue {
    pub fn new(config: QueueConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Add a job with a caller-assigned id.
    ///
    /// Re-submitting an id the queue still knows about (waiting,
    /// delayed, active, or settled within its retention window) is a
    /// no-op returning [`EnqueueOutcome::Duplicate`].
    pub fn enqueue(
        &self,
        job_id: impl Into<String>,
        payload: serde_json::Value,
        opts: JobOptions,
    ) -> QueueResult<EnqueueOutcome> {
        let job_id = job_id.into();
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(QueueError::ShutDown(self.config.name.clone()));
        }
        if state.known.contains(&job_id) {
            debug!(queue = %self.config.name, job_id = %job_id, "duplicate enqueue ignored");
            return Ok(EnqueueOutcome::Duplicate);
        }

        let timeout = opts.timeout.or(self.config.job_timeout);
        let job = Job {
            id: job_id.clone(),
            queue_name: self.config.name.clone(),
            payload,
            priority: opts.priority.unwrap_or(self.config.default_priority),
            attempts: 0,
            max_attempts: opts
                .max_attempts
                .unwrap_or(self.config.default_max_attempts)
                .max(1),
            backoff: opts.backoff.unwrap_or(self.config.default_backoff),
            correlation_id: opts.correlation_id.unwrap_or_else(|| job_id.clone()),
            timeout_ms: timeout.map(|t| t.as_millis() as u64),
            created_at: Utc::now(),
            status: JobStatus::Waiting,
        };

        let seq = state.next_seq;
        state.next_seq += 1;
        state.known.insert(job_id.clone());
        state.waiting.push(WaitingEntry { seq, job });
        drop(state);

        debug!(queue = %self.config.name, job_id = %job_id, "job enqueued");
        self.notify.notify_one();
        Ok(EnqueueOutcome::Accepted)
    }

    /// Stop handing out jobs; active jobs run to completion.
    pub fn pause(&self) {
        self.state.lock().paused = true;
        info!(queue = %self.config.name, "queue paused");
    }

    /// Resume handing out jobs.
    pub fn resume(&self) {
        self.state.lock().paused = false;
        info!(queue = %self.config.name, "queue resumed");
        self.notify.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Aggregate counters across all job states.
    pub fn counts(&self) -> QueueCounts {
        let state = self.state.lock();
        QueueCounts {
            waiting: state.waiting.len(),
            active: state.active.len(),
            completed: state.completed.len(),
            failed: state.failed.len(),
            delayed: state.delayed.len(),
        }
    }

    /// Fetch a snapshot of a job in any state.
    pub fn job(&self, job_id: &str) -> Option<Job> {
        let state = self.state.lock();
        if let Some(job) = state.active.get(job_id) {
            return Some(job.clone());
        }
        if let Some(entry) = state.waiting.iter().find(|e| e.job.id == job_id) {
            return Some(entry.job.clone());
        }
        if let Some(entry) = state.delayed.iter().find(|e| e.job.id == job_id) {
            return Some(entry.job.clone());
        }
        if let Some(entry) = state.completed.get(job_id) {
            return Some(entry.job.clone());
        }
        state.failed.get(job_id).map(|e| e.job.clone())
    }

    /// Remove a job that has not started executing.
    ///
    /// Active jobs are not preemptible; removing one is an error.
    pub fn remove(&self, job_id: &str) -> QueueResult<Job> {
        let mut state = self.state.lock();
        if state.active.contains_key(job_id) {
            return Err(QueueError::JobActive(job_id.to_string()));
        }
        if let Some(pos) = state.waiting.iter().position(|e| e.job.id == job_id) {
            let entry = state.waiting.swap_remove(pos);
            state.known.remove(job_id);
            return Ok(entry.job);
        }
        if let Some(pos) = state.delayed.iter().position(|e| e.job.id == job_id) {
            let entry = state.delayed.swap_remove(pos);
            state.known.remove(job_id);
            return Ok(entry.job);
        }
        if let Some(entry) = state.completed.remove(job_id) {
            state.known.remove(job_id);
            return Ok(entry.job);
        }
        if let Some(entry) = state.failed.remove(job_id) {
            state.known.remove(job_id);
            return Ok(entry.job);
        }
        Err(QueueError::JobNotFound(job_id.to_string()))
    }

    /// Stop workers after their current job.
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.notify.notify_waiters();
    }

    /// Spawn the queue's worker pool running `handler`.
    ///
    /// Spawns `config.concurrency` tasks; each claims one job at a
    /// time, so per-queue parallelism is bounded by configuration and
    /// queues never share a pool.
    pub fn run_workers(self: &Arc<Self>, handler: Arc<dyn JobHandler>) -> Vec<JoinHandle<()>> {
        (0..self.config.concurrency)
            .map(|worker| {
                let queue = Arc::clone(self);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    debug!(queue = %queue.config.name, worker, "worker started");
                    while let Some(job) = queue.claim().await {
                        queue.execute(&*handler, job).await;
                    }
                    debug!(queue = %queue.config.name, worker, "worker stopped");
                })
            })
            .collect()
    }

    /// Claim the next ready job, blocking until one is available or
    /// the queue shuts down.
    async fn claim(&self) -> Option<Job> {
        loop {
            let wait = {
                let mut state = self.state.lock();
                if state.shutdown {
                    return None;
                }
                Self::promote_delayed(&mut state);

                if !state.paused {
                    if let Some(pos) = Self::next_ready(&state) {
                        let entry = state.waiting.remove(pos);
                        let mut job = entry.job;
                        job.status = JobStatus::Active;
                        job.attempts += 1;
                        state.active.insert(job.id.clone(), job.clone());
                        return Some(job);
                    }
                }

                state
                    .delayed
                    .iter()
                    .map(|e| e.ready_at.saturating_duration_since(Instant::now()))
                    .min()
                    .map_or(IDLE_POLL, |d| d.min(IDLE_POLL))
            };

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Index of the waiting entry with the lowest (priority, seq).
    fn next_ready(state: &QueueState) -> Option<usize> {
        state
            .waiting
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| (e.job.priority, e.seq))
            .map(|(pos, _)| pos)
    }

    fn promote_delayed(state: &mut QueueState) {
        let now = Instant::now();
        let mut i = 0;
        while i < state.delayed.len() {
            if state.delayed[i].ready_at <= now {
                let entry = state.delayed.swap_remove(i);
                let mut job = entry.job;
                job.status = JobStatus::Waiting;
                state.waiting.push(WaitingEntry {
                    seq: entry.seq,
                    job,
                });
            } else {
                i += 1;
            }
        }
    }

    async fn execute(&self, handler: &dyn JobHandler, job: Job) {
        let timeout = job.timeout_ms.map(Duration::from_millis);
        debug!(
            queue = %self.config.name,
            job_id = %job.id,
            attempt = job.attempts,
            "executing job"
        );

        let result = match timeout {
            Some(t) => match tokio::time::timeout(t, handler.handle(job.clone())).await {
                Ok(result) => result,
                Err(_) => Err(JobError::new(format!(
                    "job timed out after {}ms",
                    t.as_millis()
                ))),
            },
            None => handler.handle(job.clone()).await,
        };

        match result {
            Ok(()) => self.complete(&job.id),
            Err(e) => self.retry_or_fail(&job.id, &e.message),
        }
    }

    fn complete(&self, job_id: &str) {
        let mut state = self.state.lock();
        if let Some(mut job) = state.active.remove(job_id) {
            job.status = JobStatus::Completed;
            debug!(queue = %self.config.name, job_id = %job_id, "job completed");
            state.completed.insert(
                job_id.to_string(),
                SettledEntry {
                    settled_at: Instant::now(),
                    job,
                },
            );
        }
        Self::prune(&mut state, &self.config);
    }

    fn retry_or_fail(&self, job_id: &str, cause: &str) {
        let mut state = self.state.lock();
        let Some(mut job) = state.active.remove(job_id) else {
            return;
        };

        if job.can_retry() {
            let delay = job.backoff.delay_for(job.attempts);
            warn!(
                queue = %self.config.name,
                job_id = %job_id,
                attempt = job.attempts,
                delay_ms = delay.as_millis() as u64,
                cause,
                "job failed, retrying"
            );
            job.status = JobStatus::Delayed;
            let seq = state.next_seq;
            state.next_seq += 1;
            state.delayed.push(DelayedEntry {
                ready_at: Instant::now() + delay,
                seq,
                job,
            });
        } else {
            error!(
                queue = %self.config.name,
                job_id = %job_id,
                attempts = job.attempts,
                cause,
                "job failed permanently"
            );
            job.status = JobStatus::Failed;
            state.failed.insert(
                job_id.to_string(),
                SettledEntry {
                    settled_at: Instant::now(),
                    job,
                },
            );
        }
        Self::prune(&mut state, &self.config);
        drop(state);
        self.notify.notify_one();
    }

    /// Purge settled jobs past their retention window. Retention is a
    /// resource bound, not a correctness requirement.
    fn prune(state: &mut QueueState, config: &QueueConfig) {
        let now = Instant::now();
        let completed_cutoff = config.completed_retention;
        let failed_cutoff = config.failed_retention;

        let expired: Vec<String> = state
            .completed
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.settled_at) > completed_cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            state.completed.remove(&id);
            state.known.remove(&id);
        }

        let expired: Vec<String> = state
            .failed
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.settled_at) > failed_cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            state.failed.remove(&id);
            state.known.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Handler that records execution order and fails ids a configured
    /// number of times before succeeding.
    struct RecordingHandler {
        executed: Mutex<Vec<String>>,
        failures_remaining: Mutex<HashMap<String, u32>>,
    }

    impl RecordingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                executed: Mutex::new(Vec::new()),
                failures_remaining: Mutex::new(HashMap::new()),
            })
        }

        fn fail_first(self: &Arc<Self>, job_id: &str, times: u32) {
            self.failures_remaining
                .lock()
                .insert(job_id.to_string(), times);
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().clone()
        }
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        async fn handle(&self, job: Job) -> Result<(), JobError> {
            self.executed.lock().push(job.id.clone());
            let mut failures = self.failures_remaining.lock();
            if let Some(remaining) = failures.get_mut(&job.id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(JobError::new("induced failure"));
                }
            }
            Ok(())
        }
    }

    fn fast_config(name: &str) -> QueueConfig {
        QueueConfig::new(name)
            .concurrency(2)
            .default_backoff(BackoffPolicy::Fixed { delay_ms: 10 })
    }

    async fn wait_until(queue: &JobQueue, predicate: impl Fn(QueueCounts) -> bool) {
        for _ in 0..200 {
            if predicate(queue.counts()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached; counts: {:?}", queue.counts());
    }

    #[test]
    fn test_duplicate_enqueue_is_noop() {
        let queue = JobQueue::new(fast_config("test"));
        let first = queue
            .enqueue("job-1", serde_json::json!({}), JobOptions::new())
            .unwrap();
        let second = queue
            .enqueue("job-1", serde_json::json!({}), JobOptions::new())
            .unwrap();

        assert_eq!(first, EnqueueOutcome::Accepted);
        assert_eq!(second, EnqueueOutcome::Duplicate);
        assert_eq!(queue.counts().waiting, 1);
    }

    #[tokio::test]
    async fn test_jobs_execute_once_per_id() {
        let queue = JobQueue::new(fast_config("test"));
        let handler = RecordingHandler::new();

        for i in 0..5 {
            queue
                .enqueue(format!("job-{i}"), serde_json::json!({}), JobOptions::new())
                .unwrap();
            // Duplicate submissions interleaved with fresh ones
            queue
                .enqueue(format!("job-{i}"), serde_json::json!({}), JobOptions::new())
                .unwrap();
        }

        let workers = queue.run_workers(handler.clone());
        wait_until(&queue, |c| c.completed == 5).await;
        queue.shutdown();
        for w in workers {
            w.await.unwrap();
        }

        let mut executed = handler.executed();
        executed.sort();
        assert_eq!(executed.len(), 5);
        executed.dedup();
        assert_eq!(executed.len(), 5);
    }

    #[tokio::test]
    async fn test_priority_ordering_lower_value_first() {
        let queue = JobQueue::new(fast_config("test").concurrency(1));
        let handler = RecordingHandler::new();

        queue
            .enqueue("low", serde_json::json!({}), JobOptions::new().priority(9))
            .unwrap();
        queue
            .enqueue("high", serde_json::json!({}), JobOptions::new().priority(1))
            .unwrap();
        queue
            .enqueue("mid", serde_json::json!({}), JobOptions::new().priority(5))
            .unwrap();

        let workers = queue.run_workers(handler.clone());
        wait_until(&queue, |c| c.completed == 3).await;
        queue.shutdown();
        for w in workers {
            w.await.unwrap();
        }

        assert_eq!(handler.executed(), vec!["high", "mid", "low"]);
    }

    #[tokio::test]
    async fn test_retry_with_backoff_then_success() {
        let queue = JobQueue::new(fast_config("test"));
        let handler = RecordingHandler::new();
        handler.fail_first("flaky", 2);

        queue
            .enqueue(
                "flaky",
                serde_json::json!({}),
                JobOptions::new().max_attempts(5),
            )
            .unwrap();

        let workers = queue.run_workers(handler.clone());
        wait_until(&queue, |c| c.completed == 1).await;
        queue.shutdown();
        for w in workers {
            w.await.unwrap();
        }

        assert_eq!(handler.executed().len(), 3);
        let job = queue.job("flaky").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.attempts, 3);
    }

    #[tokio::test]
    async fn test_attempts_exhausted_marks_failed() {
        let queue = JobQueue::new(fast_config("test"));
        let handler = RecordingHandler::new();
        handler.fail_first("doomed", 10);

        queue
            .enqueue(
                "doomed",
                serde_json::json!({}),
                JobOptions::new().max_attempts(3),
            )
            .unwrap();

        let workers = queue.run_workers(handler.clone());
        wait_until(&queue, |c| c.failed == 1).await;
        queue.shutdown();
        for w in workers {
            w.await.unwrap();
        }

        assert_eq!(handler.executed().len(), 3);
        assert_eq!(queue.job("doomed").unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_paused_queue_holds_jobs() {
        let queue = JobQueue::new(fast_config("test"));
        let handler = RecordingHandler::new();

        queue.pause();
        queue
            .enqueue("held", serde_json::json!({}), JobOptions::new())
            .unwrap();

        let workers = queue.run_workers(handler.clone());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handler.executed().is_empty());
        assert_eq!(queue.counts().waiting, 1);

        queue.resume();
        wait_until(&queue, |c| c.completed == 1).await;
        queue.shutdown();
        for w in workers {
            w.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_job_timeout_counts_as_failure() {
        struct SlowHandler;

        #[async_trait]
        impl JobHandler for SlowHandler {
            async fn handle(&self, _job: Job) -> Result<(), JobError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }

        let queue = JobQueue::new(
            fast_config("test")
                .concurrency(1)
                .job_timeout(Duration::from_millis(20)),
        );
        queue
            .enqueue(
                "slow",
                serde_json::json!({}),
                JobOptions::new().max_attempts(1),
            )
            .unwrap();

        let workers = queue.run_workers(Arc::new(SlowHandler));
        wait_until(&queue, |c| c.failed == 1).await;
        queue.shutdown();
        for w in workers {
            w.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_remove_waiting_job() {
        let queue = JobQueue::new(fast_config("test"));
        queue
            .enqueue("gone", serde_json::json!({}), JobOptions::new())
            .unwrap();

        let removed = queue.remove("gone").unwrap();
        assert_eq!(removed.id, "gone");
        assert_eq!(queue.counts().waiting, 0);
        assert!(matches!(
            queue.remove("gone"),
            Err(QueueError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_active_job_is_refused() {
        struct BlockingHandler(Arc<AtomicUsize>);

        #[async_trait]
        impl JobHandler for BlockingHandler {
            async fn handle(&self, _job: Job) -> Result<(), JobError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            }
        }

        let queue = JobQueue::new(fast_config("test").concurrency(1));
        let started = Arc::new(AtomicUsize::new(0));
        queue
            .enqueue("busy", serde_json::json!({}), JobOptions::new())
            .unwrap();

        let workers = queue.run_workers(Arc::new(BlockingHandler(started.clone())));
        for _ in 0..100 {
            if started.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(matches!(
            queue.remove("busy"),
            Err(QueueError::JobActive(_))
        ));
        queue.shutdown();
        for w in workers {
            w.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_correlation_id_propagates_to_job() {
        let queue = JobQueue::new(fast_config("test"));
        queue
            .enqueue(
                "job-1",
                serde_json::json!({}),
                JobOptions::new().correlation_id("corr-42"),
            )
            .unwrap();
        assert_eq!(queue.job("job-1").unwrap().correlation_id, "corr-42");
    }
}
