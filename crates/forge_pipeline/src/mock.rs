//! Scripted executors for tests and offline runs.
//!
//! These capture every request and return predefined outcomes in
//! order, so pipeline behavior can be exercised without a real build
//! or deployment backend.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::executors::{
    BuildExecutor, BuildOutcome, BuildRequest, DeployExecutor, DeployOutcome, DeployRequest,
    ExecutorError,
};

/// Build executor returning scripted outcomes.
///
/// Outcomes are consumed in order; once drained, every further build
/// succeeds with a generated artifact reference.
#[derive(Default)]
pub struct ScriptedBuildExecutor {
    outcomes: Mutex<VecDeque<Result<BuildOutcome, ExecutorError>>>,
    calls: Mutex<Vec<BuildRequest>>,
}

impl ScriptedBuildExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful build producing `artifact_ref`.
    pub fn then_succeed(self, artifact_ref: impl Into<String>) -> Self {
        self.outcomes.lock().push_back(Ok(BuildOutcome {
            artifact_ref: artifact_ref.into(),
        }));
        self
    }

    /// Queue a build failure with the given cause.
    pub fn then_fail(self, cause: impl Into<String>) -> Self {
        self.outcomes
            .lock()
            .push_back(Err(ExecutorError::Failed(cause.into())));
        self
    }

    /// Queue a transient infrastructure failure.
    pub fn then_fail_transient(self, cause: impl Into<String>) -> Self {
        self.outcomes
            .lock()
            .push_back(Err(ExecutorError::Transient(cause.into())));
        self
    }

    /// Requests received so far, in order.
    pub fn calls(&self) -> Vec<BuildRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl BuildExecutor for ScriptedBuildExecutor {
    async fn build(&self, request: BuildRequest) -> Result<BuildOutcome, ExecutorError> {
        self.calls.lock().push(request.clone());
        self.outcomes.lock().pop_front().unwrap_or_else(|| {
            Ok(BuildOutcome {
                artifact_ref: format!("artifact://{}", request.build_id),
            })
        })
    }
}

/// Deploy executor returning scripted outcomes.
///
/// Once drained, every further deployment succeeds with a preview URL
/// derived from the project id.
#[derive(Default)]
pub struct ScriptedDeployExecutor {
    outcomes: Mutex<VecDeque<Result<DeployOutcome, ExecutorError>>>,
    calls: Mutex<Vec<DeployRequest>>,
}

impl ScriptedDeployExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_succeed(self, url: impl Into<String>) -> Self {
        self.outcomes
            .lock()
            .push_back(Ok(DeployOutcome { url: url.into() }));
        self
    }

    pub fn then_fail(self, cause: impl Into<String>) -> Self {
        self.outcomes
            .lock()
            .push_back(Err(ExecutorError::Failed(cause.into())));
        self
    }

    pub fn calls(&self) -> Vec<DeployRequest> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl DeployExecutor for ScriptedDeployExecutor {
    async fn deploy(&self, request: DeployRequest) -> Result<DeployOutcome, ExecutorError> {
        self.calls.lock().push(request.clone());
        self.outcomes.lock().pop_front().unwrap_or_else(|| {
            Ok(DeployOutcome {
                url: format!("https://{}.preview.appforge.dev", request.project_id),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::DeployTarget;

    fn build_request() -> BuildRequest {
        BuildRequest {
            build_id: "build:p:1".to_string(),
            project_id: "p".to_string(),
            correlation_id: "c".to_string(),
            attempt: 1,
            spec: serde_json::from_value(serde_json::json!({
                "name": "app",
                "description": "d",
                "pages": [{"route": "/", "title": "Home"}],
                "data_models": [{"name": "User", "fields": [
                    {"name": "id", "field_type": "string", "required": true, "unique": true}
                ]}]
            }))
            .expect("valid fixture"),
            repair_hint: None,
        }
    }

    #[tokio::test]
    async fn test_scripted_outcomes_in_order_then_default_success() {
        let executor = ScriptedBuildExecutor::new()
            .then_fail("missing dependency: bcrypt")
            .then_succeed("artifact://one");

        assert!(executor.build(build_request()).await.is_err());
        assert_eq!(
            executor.build(build_request()).await.unwrap().artifact_ref,
            "artifact://one"
        );
        // Drained: defaults to success
        assert!(executor.build(build_request()).await.is_ok());
        assert_eq!(executor.call_count(), 3);
    }

    #[tokio::test]
    async fn test_deploy_captures_requests() {
        let executor = ScriptedDeployExecutor::new().then_succeed("https://app.example.com");
        let outcome = executor
            .deploy(DeployRequest {
                deployment_id: "deploy:p:1".to_string(),
                project_id: "p".to_string(),
                correlation_id: "c".to_string(),
                artifact_ref: "artifact://one".to_string(),
                target: DeployTarget::Preview,
            })
            .await
            .unwrap();

        assert_eq!(outcome.url, "https://app.example.com");
        assert_eq!(executor.calls()[0].artifact_ref, "artifact://one");
    }
}
