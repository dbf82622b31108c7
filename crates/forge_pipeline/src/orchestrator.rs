//! Stage handlers wired onto the queues.
//!
//! The orchestrator owns the run store, the producers and the
//! executors and translates job completion and failure into the next
//! stage submission. Every handler is idempotent: re-delivery of a job
//! finds its transition already applied and its follow-up job already
//! known to the target queue.

use std::sync::Arc;

use forge_events::{EventSink, EventType, NullSink, ProgressEvent};
use forge_planner::{PlanRequest, Planner, PlannerError};
use forge_queue::{Job, JobError, JobHandler, QueueKind, QueueRegistry};
use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::executors::{
    BuildExecutor, BuildRequest, DeployExecutor, DeployRequest, DeployTarget, ExecutorError,
};
use crate::healing::{
    AttemptOutcome, HealingAttempt, HealingLog, HealingPolicy, RepairAdvisor, RuleBasedAdvisor,
};
use crate::jobs::{
    BuildJobPayload, DeployJobPayload, GenerationJobPayload, JobProducer, NotificationJobPayload,
};
use crate::run::{PipelineRun, RunStore, Stage, TransitionOutcome, TransitionUpdate};

/// Drives pipeline runs across the queues.
pub struct PipelineOrchestrator {
    runs: Arc<RunStore>,
    registry: Arc<QueueRegistry>,
    producer: JobProducer,
    planner: Arc<Planner>,
    build_exec: Arc<dyn BuildExecutor>,
    deploy_exec: Arc<dyn DeployExecutor>,
    advisor: Arc<dyn RepairAdvisor>,
    healing: HealingLog,
    policy: HealingPolicy,
    events: Arc<dyn EventSink>,
}

impl PipelineOrchestrator {
    pub fn new(
        registry: Arc<QueueRegistry>,
        planner: Arc<Planner>,
        build_exec: Arc<dyn BuildExecutor>,
        deploy_exec: Arc<dyn DeployExecutor>,
    ) -> Self {
        Self {
            runs: Arc::new(RunStore::new()),
            producer: JobProducer::new(registry.clone()),
            registry,
            planner,
            build_exec,
            deploy_exec,
            advisor: Arc::new(RuleBasedAdvisor::new()),
            healing: HealingLog::new(),
            policy: HealingPolicy::default(),
            events: Arc::new(NullSink),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.policy = HealingPolicy::new(config.healing_max_attempts);
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn RepairAdvisor>) -> Self {
        self.advisor = advisor;
        self
    }

    /// Current run record for a project, if any.
    pub fn run(&self, project_id: &str) -> Option<PipelineRun> {
        self.runs.get(project_id)
    }

    /// Repair attempts recorded in the current build-failure episode.
    pub fn healing_attempts(&self, project_id: &str) -> Vec<HealingAttempt> {
        self.healing.attempts(project_id)
    }

    /// Accept a prompt: create the run and queue generation.
    ///
    /// Refused while the project already has an active run.
    pub fn submit(
        &self,
        project_id: &str,
        user_id: &str,
        prompt: &str,
        asset_keys: Vec<String>,
    ) -> PipelineResult<PipelineRun> {
        let correlation_id = Uuid::new_v4().to_string();
        self.runs.create(project_id, &correlation_id)?;
        self.runs.transition(
            project_id,
            &correlation_id,
            Stage::Submitted,
            Stage::Generating,
            TransitionUpdate::default(),
        )?;
        self.producer.add_full_app_generation_job(
            project_id,
            user_id,
            prompt,
            asset_keys,
            &correlation_id,
        )?;
        self.events.publish(ProgressEvent::new(
            project_id,
            EventType::Progress,
            "prompt accepted, generation queued",
        ));
        self.runs
            .get(project_id)
            .ok_or_else(|| PipelineError::RunNotFound(project_id.to_string()))
    }

    /// Spawn workers for every queue the orchestrator consumes.
    pub fn start(self: &Arc<Self>) -> PipelineResult<Vec<JoinHandle<()>>> {
        let mut handles = Vec::new();
        handles.extend(
            self.registry
                .queue(QueueKind::Generation)?
                .run_workers(Arc::new(GenerationHandler(self.clone()))),
        );
        handles.extend(
            self.registry
                .queue(QueueKind::Build)?
                .run_workers(Arc::new(BuildHandler(self.clone()))),
        );
        handles.extend(
            self.registry
                .queue(QueueKind::Deployment)?
                .run_workers(Arc::new(DeployHandler(self.clone()))),
        );
        handles.extend(
            self.registry
                .queue(QueueKind::Notifications)?
                .run_workers(Arc::new(NotificationHandler(self.clone()))),
        );
        Ok(handles)
    }

    /// Stop all queue workers after their current job.
    pub fn shutdown(&self) {
        self.registry.shutdown_all();
    }

    async fn handle_generation(&self, job: Job) -> Result<(), JobError> {
        let payload: GenerationJobPayload = job.payload_as().map_err(job_error)?;
        let project_id = payload.project_id.clone();
        let correlation_id = payload.correlation_id.clone();

        self.events.publish(ProgressEvent::new(
            &project_id,
            EventType::Thought,
            "planning the application structure",
        ));

        let mut request = PlanRequest::new(&payload.prompt);
        for key in &payload.asset_keys {
            request = request.with_asset_note(key.clone());
        }

        match self.planner.plan(&request).await {
            Ok(spec) => {
                // Transition before enqueueing so the build handler
                // never observes a stale stage. A duplicate delivery
                // finds the transition already applied and enqueues
                // nothing.
                let outcome = self
                    .runs
                    .transition(
                        &project_id,
                        &correlation_id,
                        Stage::Generating,
                        Stage::Built,
                        TransitionUpdate::default(),
                    )
                    .map_err(job_error)?;
                if outcome == TransitionOutcome::Applied {
                    self.producer
                        .add_build_job(&project_id, &correlation_id, 1, &spec, None)
                        .map_err(job_error)?;
                    self.events.publish(
                        ProgressEvent::new(
                            &project_id,
                            EventType::Build,
                            "specification ready, build queued",
                        )
                        .with_metadata(serde_json::json!({ "spec_name": spec.name })),
                    );
                }
                Ok(())
            }
            Err(PlannerError::Model(reason)) => {
                // Transient model trouble is the queue's to retry; only
                // the final attempt ends the run.
                if !job.can_retry() {
                    self.fail_run(&project_id, &correlation_id, Stage::Generating, &reason)
                        .map_err(job_error)?;
                }
                Err(JobError::new(reason))
            }
            Err(e) => {
                let reason = e.to_string();
                self.fail_run(&project_id, &correlation_id, Stage::Generating, &reason)
                    .map_err(job_error)?;
                Ok(())
            }
        }
    }

    async fn handle_build(&self, job: Job) -> Result<(), JobError> {
        let payload: BuildJobPayload = job.payload_as().map_err(job_error)?;

        self.events.publish(ProgressEvent::new(
            &payload.project_id,
            EventType::Build,
            format!("building application (attempt {})", payload.attempt),
        ));

        let request = BuildRequest {
            build_id: payload.build_id.clone(),
            project_id: payload.project_id.clone(),
            correlation_id: payload.correlation_id.clone(),
            attempt: payload.attempt,
            spec: payload.spec.clone(),
            repair_hint: payload.repair_hint.clone(),
        };

        match self.build_exec.build(request).await {
            Ok(outcome) => {
                self.healing.clear(&payload.project_id);
                let applied = self
                    .runs
                    .transition(
                        &payload.project_id,
                        &payload.correlation_id,
                        Stage::Built,
                        Stage::Deploying,
                        TransitionUpdate::default(),
                    )
                    .map_err(job_error)?;
                if applied == TransitionOutcome::Applied {
                    self.producer
                        .add_deploy_job(
                            &payload.project_id,
                            &payload.correlation_id,
                            payload.attempt,
                            &outcome.artifact_ref,
                            DeployTarget::Preview,
                        )
                        .map_err(job_error)?;
                    self.events.publish(ProgressEvent::new(
                        &payload.project_id,
                        EventType::Deployment,
                        "build succeeded, deployment queued",
                    ));
                }
                Ok(())
            }
            Err(ExecutorError::Failed(cause)) => {
                self.heal(&payload, &cause).await.map_err(job_error)?;
                Ok(())
            }
            Err(ExecutorError::Transient(cause)) => {
                if job.can_retry() {
                    return Err(JobError::new(cause));
                }
                // Infrastructure stayed down through every queue
                // attempt; hand the episode to the healing controller.
                self.heal(&payload, &cause).await.map_err(job_error)?;
                Ok(())
            }
        }
    }

    /// One repair step: record the attempt and either resubmit the
    /// build with a proposed action or end the run.
    async fn heal(&self, payload: &BuildJobPayload, cause: &str) -> PipelineResult<()> {
        let project_id = &payload.project_id;
        let correlation_id = &payload.correlation_id;

        let entered = self.runs.transition(
            project_id,
            correlation_id,
            Stage::Built,
            Stage::Healing,
            TransitionUpdate::error(cause),
        )?;
        if entered == TransitionOutcome::AlreadyApplied {
            return Ok(());
        }

        let attempt_number = self.healing.count(project_id) + 1;
        if attempt_number > self.policy.max_attempts {
            warn!(
                project_id,
                attempt_number,
                budget = self.policy.max_attempts,
                "repair budget exhausted"
            );
            self.healing.mark_exhausted(project_id);
            let message = format!(
                "build could not be repaired after {} attempts: {cause}",
                self.policy.max_attempts
            );
            self.runs.transition(
                project_id,
                correlation_id,
                Stage::Healing,
                Stage::Failed,
                TransitionUpdate::error(&message),
            )?;
            self.events
                .publish(ProgressEvent::new(project_id, EventType::Error, &message));
            self.producer
                .add_notification_job(project_id, correlation_id, "failed", &message)?;
            return Ok(());
        }

        let action = self.advisor.propose(cause).await;
        self.healing.record(HealingAttempt {
            project_id: project_id.clone(),
            attempt_number,
            cause: cause.to_string(),
            action: action.description.clone(),
            outcome: AttemptOutcome::Resubmitted,
        });
        self.events.publish(
            ProgressEvent::new(
                project_id,
                EventType::Healing,
                format!(
                    "repair attempt {attempt_number}/{}: {}",
                    self.policy.max_attempts, action.description
                ),
            )
            .with_metadata(serde_json::json!({ "kind": action.kind })),
        );
        self.runs.transition(
            project_id,
            correlation_id,
            Stage::Healing,
            Stage::Built,
            TransitionUpdate::attempt(attempt_number),
        )?;
        self.producer.add_build_job(
            project_id,
            correlation_id,
            payload.attempt + 1,
            &payload.spec,
            Some(action.description),
        )?;
        Ok(())
    }

    async fn handle_deploy(&self, job: Job) -> Result<(), JobError> {
        let payload: DeployJobPayload = job.payload_as().map_err(job_error)?;

        self.events.publish(ProgressEvent::new(
            &payload.project_id,
            EventType::Deployment,
            format!("deploying {}", payload.artifact_ref),
        ));

        let request = DeployRequest {
            deployment_id: payload.deployment_id.clone(),
            project_id: payload.project_id.clone(),
            correlation_id: payload.correlation_id.clone(),
            artifact_ref: payload.artifact_ref.clone(),
            target: payload.target,
        };

        match self.deploy_exec.deploy(request).await {
            Ok(outcome) => {
                let applied = self
                    .runs
                    .transition(
                        &payload.project_id,
                        &payload.correlation_id,
                        Stage::Deploying,
                        Stage::Ready,
                        TransitionUpdate::deployed(&outcome.url),
                    )
                    .map_err(job_error)?;
                if applied == TransitionOutcome::Applied {
                    let message = format!("application live at {}", outcome.url);
                    self.events.publish(
                        ProgressEvent::new(&payload.project_id, EventType::Success, &message)
                            .with_metadata(serde_json::json!({ "url": outcome.url })),
                    );
                    self.producer
                        .add_notification_job(
                            &payload.project_id,
                            &payload.correlation_id,
                            "ready",
                            &message,
                        )
                        .map_err(job_error)?;
                }
                Ok(())
            }
            Err(e) => {
                let cause = e.to_string();
                if !job.can_retry() {
                    self.fail_run(
                        &payload.project_id,
                        &payload.correlation_id,
                        Stage::Deploying,
                        &cause,
                    )
                    .map_err(job_error)?;
                }
                Err(JobError::new(cause))
            }
        }
    }

    async fn handle_notification(&self, job: Job) -> Result<(), JobError> {
        let payload: NotificationJobPayload = job.payload_as().map_err(job_error)?;
        info!(
            project_id = %payload.project_id,
            status = %payload.status,
            "delivering notification: {}",
            payload.message
        );
        self.events.publish(
            ProgressEvent::new(&payload.project_id, EventType::System, &payload.message)
                .with_metadata(serde_json::json!({ "status": payload.status })),
        );
        Ok(())
    }

    fn fail_run(
        &self,
        project_id: &str,
        correlation_id: &str,
        from: Stage,
        cause: &str,
    ) -> PipelineResult<()> {
        let outcome = self.runs.transition(
            project_id,
            correlation_id,
            from,
            Stage::Failed,
            TransitionUpdate::error(cause),
        )?;
        if outcome == TransitionOutcome::Applied {
            self.events
                .publish(ProgressEvent::new(project_id, EventType::Error, cause));
            self.producer
                .add_notification_job(project_id, correlation_id, "failed", cause)?;
        }
        Ok(())
    }
}

fn job_error(e: impl std::fmt::Display) -> JobError {
    JobError::new(e.to_string())
}

struct GenerationHandler(Arc<PipelineOrchestrator>);

#[async_trait]
impl JobHandler for GenerationHandler {
    async fn handle(&self, job: Job) -> Result<(), JobError> {
        self.0.handle_generation(job).await
    }
}

struct BuildHandler(Arc<PipelineOrchestrator>);

#[async_trait]
impl JobHandler for BuildHandler {
    async fn handle(&self, job: Job) -> Result<(), JobError> {
        self.0.handle_build(job).await
    }
}

struct DeployHandler(Arc<PipelineOrchestrator>);

#[async_trait]
impl JobHandler for DeployHandler {
    async fn handle(&self, job: Job) -> Result<(), JobError> {
        self.0.handle_deploy(job).await
    }
}

struct NotificationHandler(Arc<PipelineOrchestrator>);

#[async_trait]
impl JobHandler for NotificationHandler {
    async fn handle(&self, job: Job) -> Result<(), JobError> {
        self.0.handle_notification(job).await
    }
}
