//! Contracts for the external build and deploy collaborators.
//!
//! The pipeline does not run builds or deployments itself; it hands
//! requests to executors and translates their outcomes into stage
//! transitions. Requests are keyed by the executor's own identifier
//! plus the correlation id of the pipeline run.

use async_trait::async_trait;
use forge_spec::TechnicalSpecification;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by an executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Infrastructure hiccup; safe to retry at the queue level
    #[error("transient executor failure: {0}")]
    Transient(String),

    /// The work itself failed (compile error, bad manifest, ...)
    #[error("{0}")]
    Failed(String),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeployTarget {
    Preview,
    Production,
}

/// Request handed to the build executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildRequest {
    pub build_id: String,
    pub project_id: String,
    pub correlation_id: String,
    /// 1-based build attempt within this run
    pub attempt: u32,
    pub spec: TechnicalSpecification,
    /// Corrective action proposed by the self-healing controller, if
    /// this build is a repair re-submission
    pub repair_hint: Option<String>,
}

/// Successful build result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildOutcome {
    /// Reference to the built artifact, passed through to deployment
    pub artifact_ref: String,
}

/// Request handed to the deploy executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployRequest {
    pub deployment_id: String,
    pub project_id: String,
    pub correlation_id: String,
    pub artifact_ref: String,
    pub target: DeployTarget,
}

/// Successful deployment result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployOutcome {
    pub url: String,
}

/// Build execution collaborator.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    async fn build(&self, request: BuildRequest) -> Result<BuildOutcome, ExecutorError>;
}

/// Deployment execution collaborator.
#[async_trait]
pub trait DeployExecutor: Send + Sync {
    async fn deploy(&self, request: DeployRequest) -> Result<DeployOutcome, ExecutorError>;
}
