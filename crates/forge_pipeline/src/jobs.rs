//! Typed job payloads and the enqueue API.
//!
//! Producers derive deterministic, caller-assigned job ids so that
//! re-submitting the same logical job is deduplicated by the queue,
//! and every payload carries the run's correlation id unchanged.

use std::sync::Arc;

use forge_queue::{priority, EnqueueOutcome, JobOptions, QueueKind, QueueRegistry, QueueResult};
use forge_spec::TechnicalSpecification;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineResult;
use crate::executors::DeployTarget;

/// Payload of a full-application generation job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationJobPayload {
    pub project_id: String,
    pub user_id: String,
    pub prompt: String,
    #[serde(default)]
    pub asset_keys: Vec<String>,
    pub correlation_id: String,
}

/// Payload of a build job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildJobPayload {
    pub build_id: String,
    pub project_id: String,
    pub correlation_id: String,
    /// 1-based build attempt within this run
    pub attempt: u32,
    pub spec: TechnicalSpecification,
    #[serde(default)]
    pub repair_hint: Option<String>,
}

/// Payload of a deployment job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployJobPayload {
    pub deployment_id: String,
    pub project_id: String,
    pub correlation_id: String,
    pub artifact_ref: String,
    pub target: DeployTarget,
}

/// Payload of an ancillary AI task job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiTaskJobPayload {
    pub project_id: String,
    pub correlation_id: String,
    pub task: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

/// Payload of a notification job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationJobPayload {
    pub project_id: String,
    pub correlation_id: String,
    /// Terminal status being reported (ready, failed)
    pub status: String,
    pub message: String,
}

/// The enqueue API consumed by the presentation layer and by the
/// orchestrator's own stage handlers.
pub struct JobProducer {
    registry: Arc<QueueRegistry>,
}

impl JobProducer {
    pub fn new(registry: Arc<QueueRegistry>) -> Self {
        Self { registry }
    }

    /// Enqueue a full-application generation job.
    ///
    /// Generation is the most expensive job type and is deliberately
    /// deprioritized below lightweight tasks.
    pub fn add_full_app_generation_job(
        &self,
        project_id: &str,
        user_id: &str,
        prompt: &str,
        asset_keys: Vec<String>,
        correlation_id: &str,
    ) -> PipelineResult<String> {
        let job_id = format!("gen:{project_id}");
        let payload = GenerationJobPayload {
            project_id: project_id.to_string(),
            user_id: user_id.to_string(),
            prompt: prompt.to_string(),
            asset_keys,
            correlation_id: correlation_id.to_string(),
        };
        self.enqueue(
            QueueKind::Generation,
            &job_id,
            serde_json::to_value(&payload)?,
            JobOptions::new()
                .priority(priority::FULL_APP_GENERATION)
                .correlation_id(correlation_id),
        )?;
        Ok(job_id)
    }

    /// Enqueue a build job for attempt `attempt` of this run.
    pub fn add_build_job(
        &self,
        project_id: &str,
        correlation_id: &str,
        attempt: u32,
        spec: &TechnicalSpecification,
        repair_hint: Option<String>,
    ) -> PipelineResult<String> {
        let job_id = format!("build:{project_id}:{attempt}");
        let payload = BuildJobPayload {
            build_id: job_id.clone(),
            project_id: project_id.to_string(),
            correlation_id: correlation_id.to_string(),
            attempt,
            spec: spec.clone(),
            repair_hint,
        };
        self.enqueue(
            QueueKind::Build,
            &job_id,
            serde_json::to_value(&payload)?,
            JobOptions::new().correlation_id(correlation_id),
        )?;
        Ok(job_id)
    }

    /// Enqueue a deployment job. Production deployments outrank
    /// previews within the deployment queue.
    pub fn add_deploy_job(
        &self,
        project_id: &str,
        correlation_id: &str,
        attempt: u32,
        artifact_ref: &str,
        target: DeployTarget,
    ) -> PipelineResult<String> {
        let job_id = format!("deploy:{project_id}:{attempt}");
        let payload = DeployJobPayload {
            deployment_id: job_id.clone(),
            project_id: project_id.to_string(),
            correlation_id: correlation_id.to_string(),
            artifact_ref: artifact_ref.to_string(),
            target,
        };
        let deploy_priority = match target {
            DeployTarget::Production => priority::PRODUCTION_DEPLOY,
            DeployTarget::Preview => priority::PREVIEW_DEPLOY,
        };
        self.enqueue(
            QueueKind::Deployment,
            &job_id,
            serde_json::to_value(&payload)?,
            JobOptions::new()
                .priority(deploy_priority)
                .correlation_id(correlation_id),
        )?;
        Ok(job_id)
    }

    /// Enqueue an ancillary AI task.
    pub fn add_ai_task_job(
        &self,
        project_id: &str,
        correlation_id: &str,
        task: &str,
        input: serde_json::Value,
    ) -> PipelineResult<String> {
        let job_id = format!("ai:{project_id}:{task}");
        let payload = AiTaskJobPayload {
            project_id: project_id.to_string(),
            correlation_id: correlation_id.to_string(),
            task: task.to_string(),
            input,
        };
        self.enqueue(
            QueueKind::AiTasks,
            &job_id,
            serde_json::to_value(&payload)?,
            JobOptions::new()
                .priority(priority::LIGHT_TASK)
                .correlation_id(correlation_id),
        )?;
        Ok(job_id)
    }

    /// Enqueue a terminal-status notification.
    pub fn add_notification_job(
        &self,
        project_id: &str,
        correlation_id: &str,
        status: &str,
        message: &str,
    ) -> PipelineResult<String> {
        let job_id = format!("notify:{project_id}:{status}");
        let payload = NotificationJobPayload {
            project_id: project_id.to_string(),
            correlation_id: correlation_id.to_string(),
            status: status.to_string(),
            message: message.to_string(),
        };
        self.enqueue(
            QueueKind::Notifications,
            &job_id,
            serde_json::to_value(&payload)?,
            JobOptions::new()
                .priority(priority::LIGHT_TASK)
                .correlation_id(correlation_id),
        )?;
        Ok(job_id)
    }

    fn enqueue(
        &self,
        kind: QueueKind,
        job_id: &str,
        payload: serde_json::Value,
        opts: JobOptions,
    ) -> QueueResult<EnqueueOutcome> {
        let outcome = self.registry.queue(kind)?.enqueue(job_id, payload, opts)?;
        debug!(queue = %kind, job_id, ?outcome, "job submitted");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_queue::QueueKind;

    fn spec() -> TechnicalSpecification {
        serde_json::from_value(serde_json::json!({
            "name": "app",
            "description": "d",
            "pages": [{"route": "/", "title": "Home"}],
            "data_models": [{"name": "User", "fields": [
                {"name": "email", "field_type": "string", "required": true, "unique": true}
            ]}]
        }))
        .expect("valid fixture")
    }

    #[test]
    fn test_generation_job_gets_low_priority_and_threads_correlation() {
        let registry = Arc::new(QueueRegistry::with_defaults());
        let producer = JobProducer::new(registry.clone());

        let job_id = producer
            .add_full_app_generation_job("proj", "user", "Build a todo app", vec![], "corr")
            .unwrap();

        let queue = registry.queue(QueueKind::Generation).unwrap();
        let job = queue.job(&job_id).unwrap();
        assert_eq!(job.priority, priority::FULL_APP_GENERATION);
        assert_eq!(job.correlation_id, "corr");

        let payload: GenerationJobPayload = job.payload_as().unwrap();
        assert_eq!(payload.prompt, "Build a todo app");
        assert_eq!(payload.correlation_id, "corr");
    }

    #[test]
    fn test_resubmitting_generation_job_is_deduplicated() {
        let registry = Arc::new(QueueRegistry::with_defaults());
        let producer = JobProducer::new(registry.clone());

        producer
            .add_full_app_generation_job("proj", "user", "prompt", vec![], "corr")
            .unwrap();
        producer
            .add_full_app_generation_job("proj", "user", "prompt", vec![], "corr")
            .unwrap();

        let counts = registry.queue(QueueKind::Generation).unwrap().counts();
        assert_eq!(counts.waiting, 1);
    }

    #[test]
    fn test_production_deploy_outranks_preview() {
        let registry = Arc::new(QueueRegistry::with_defaults());
        let producer = JobProducer::new(registry.clone());

        producer
            .add_deploy_job("a", "corr-a", 1, "artifact-a", DeployTarget::Preview)
            .unwrap();
        producer
            .add_deploy_job("b", "corr-b", 1, "artifact-b", DeployTarget::Production)
            .unwrap();

        let queue = registry.queue(QueueKind::Deployment).unwrap();
        let preview = queue.job("deploy:a:1").unwrap();
        let production = queue.job("deploy:b:1").unwrap();
        assert!(production.priority < preview.priority);
    }

    #[test]
    fn test_build_attempts_get_distinct_ids() {
        let registry = Arc::new(QueueRegistry::with_defaults());
        let producer = JobProducer::new(registry.clone());

        let first = producer
            .add_build_job("proj", "corr", 1, &spec(), None)
            .unwrap();
        let second = producer
            .add_build_job("proj", "corr", 2, &spec(), Some("add bcrypt".to_string()))
            .unwrap();

        assert_ne!(first, second);
        let counts = registry.queue(QueueKind::Build).unwrap().counts();
        assert_eq!(counts.waiting, 2);
    }
}
