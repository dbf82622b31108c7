//! Pipeline run record and stage state machine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Prompt accepted, generation job not yet enqueued
    Submitted,
    /// Generation job enqueued or planning in progress
    Generating,
    /// Specification produced; build job enqueued or building
    Built,
    /// Automated repair in progress after a build failure
    Healing,
    /// Deploy job enqueued or deploying
    Deploying,
    /// Deployment live; terminal
    Ready,
    /// Terminal failure
    Failed,
}

impl Stage {
    /// Check if transition to the given stage is valid.
    pub fn can_transition_to(&self, next: &Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Submitted, Generating)
                | (Generating, Built)
                | (Generating, Failed)
                | (Built, Deploying)
                | (Built, Healing)
                | (Healing, Built)
                | (Healing, Failed)
                | (Deploying, Ready)
                | (Deploying, Failed)
        )
    }

    /// Terminal stages admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Ready | Stage::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Generating => "generating",
            Self::Built => "built",
            Self::Healing => "healing",
            Self::Deploying => "deploying",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative record of one project's journey through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineRun {
    pub project_id: String,
    /// Threads all jobs and events of this run
    pub correlation_id: String,
    pub stage: Stage,
    pub attempts_at_stage: u32,
    pub last_error: Option<String>,
    pub deployment_url: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new(project_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            project_id: project_id.into(),
            correlation_id: correlation_id.into(),
            stage: Stage::Submitted,
            attempts_at_stage: 0,
            last_error: None,
            deployment_url: None,
            started_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of applying a stage transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The run advanced to the requested stage
    Applied,
    /// Duplicate or stale delivery; the run was left untouched
    AlreadyApplied,
}

/// Optional fields recorded together with a transition.
#[derive(Debug, Clone, Default)]
pub struct TransitionUpdate {
    pub last_error: Option<String>,
    pub deployment_url: Option<String>,
    pub attempts_at_stage: Option<u32>,
}

impl TransitionUpdate {
    pub fn error(cause: impl Into<String>) -> Self {
        Self {
            last_error: Some(cause.into()),
            ..Self::default()
        }
    }

    pub fn deployed(url: impl Into<String>) -> Self {
        Self {
            deployment_url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn attempt(n: u32) -> Self {
        Self {
            attempts_at_stage: Some(n),
            ..Self::default()
        }
    }
}

/// In-memory store of pipeline runs.
///
/// Runs are mutated only through [`RunStore::transition`], serialized
/// per project by the internal lock. Terminal runs are archived:
/// still readable, never advanced again.
#[derive(Default)]
pub struct RunStore {
    active: Mutex<HashMap<String, PipelineRun>>,
    archived: Mutex<HashMap<String, PipelineRun>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a run for a project. Refused while a run is active.
    pub fn create(
        &self,
        project_id: &str,
        correlation_id: &str,
    ) -> PipelineResult<PipelineRun> {
        let mut active = self.active.lock();
        if active.contains_key(project_id) {
            return Err(PipelineError::RunAlreadyActive(project_id.to_string()));
        }
        let run = PipelineRun::new(project_id, correlation_id);
        active.insert(project_id.to_string(), run.clone());
        Ok(run)
    }

    /// Fetch a run, active or archived.
    pub fn get(&self, project_id: &str) -> Option<PipelineRun> {
        if let Some(run) = self.active.lock().get(project_id) {
            return Some(run.clone());
        }
        self.archived.lock().get(project_id).cloned()
    }

    /// Apply a stage transition guarded by (stage, correlation id).
    ///
    /// Duplicate delivery of the same completion event finds the run
    /// already past `from` (or the correlation id stale) and returns
    /// [`TransitionOutcome::AlreadyApplied`] without mutating. Once a
    /// run is terminal no transition is ever applied again.
    pub fn transition(
        &self,
        project_id: &str,
        correlation_id: &str,
        from: Stage,
        to: Stage,
        update: TransitionUpdate,
    ) -> PipelineResult<TransitionOutcome> {
        let mut active = self.active.lock();
        let Some(run) = active.get_mut(project_id) else {
            // Terminal runs live in the archive; anything arriving for
            // them is a duplicate by definition.
            if self.archived.lock().contains_key(project_id) {
                return Ok(TransitionOutcome::AlreadyApplied);
            }
            return Err(PipelineError::RunNotFound(project_id.to_string()));
        };

        if run.correlation_id != correlation_id {
            debug!(
                project_id,
                correlation_id, "stale correlation id; transition ignored"
            );
            return Ok(TransitionOutcome::AlreadyApplied);
        }
        if run.stage.is_terminal() || run.stage != from {
            debug!(
                project_id,
                current = %run.stage,
                from = %from,
                to = %to,
                "duplicate or out-of-order transition ignored"
            );
            return Ok(TransitionOutcome::AlreadyApplied);
        }
        if !from.can_transition_to(&to) {
            return Err(PipelineError::InvalidTransition { from, to });
        }

        run.stage = to;
        run.updated_at = Utc::now();
        if let Some(cause) = update.last_error {
            run.last_error = Some(cause);
        }
        if let Some(url) = update.deployment_url {
            run.deployment_url = Some(url);
        }
        run.attempts_at_stage = update.attempts_at_stage.unwrap_or(0);

        info!(project_id, from = %from, to = %to, "stage transition");

        if to.is_terminal() {
            let run = active.remove(project_id);
            if let Some(run) = run {
                self.archived.lock().insert(project_id.to_string(), run);
            }
        }
        Ok(TransitionOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_path_transitions() {
        assert!(Stage::Submitted.can_transition_to(&Stage::Generating));
        assert!(Stage::Generating.can_transition_to(&Stage::Built));
        assert!(Stage::Built.can_transition_to(&Stage::Deploying));
        assert!(Stage::Deploying.can_transition_to(&Stage::Ready));
    }

    #[test]
    fn test_healing_only_from_build() {
        assert!(Stage::Built.can_transition_to(&Stage::Healing));
        assert!(Stage::Healing.can_transition_to(&Stage::Built));
        assert!(Stage::Healing.can_transition_to(&Stage::Failed));
        assert!(!Stage::Generating.can_transition_to(&Stage::Healing));
        assert!(!Stage::Deploying.can_transition_to(&Stage::Healing));
    }

    #[test]
    fn test_terminal_stages_have_no_exits() {
        for next in [
            Stage::Submitted,
            Stage::Generating,
            Stage::Built,
            Stage::Healing,
            Stage::Deploying,
            Stage::Ready,
            Stage::Failed,
        ] {
            assert!(!Stage::Ready.can_transition_to(&next));
            assert!(!Stage::Failed.can_transition_to(&next));
        }
    }

    #[test]
    fn test_transition_applies_and_updates() {
        let store = RunStore::new();
        store.create("proj", "corr").unwrap();

        let outcome = store
            .transition(
                "proj",
                "corr",
                Stage::Submitted,
                Stage::Generating,
                TransitionUpdate::default(),
            )
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Applied);
        assert_eq!(store.get("proj").unwrap().stage, Stage::Generating);
    }

    #[test]
    fn test_duplicate_transition_is_noop() {
        let store = RunStore::new();
        store.create("proj", "corr").unwrap();
        store
            .transition(
                "proj",
                "corr",
                Stage::Submitted,
                Stage::Generating,
                TransitionUpdate::default(),
            )
            .unwrap();

        // Same completion delivered twice
        let outcome = store
            .transition(
                "proj",
                "corr",
                Stage::Submitted,
                Stage::Generating,
                TransitionUpdate::default(),
            )
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::AlreadyApplied);
        assert_eq!(store.get("proj").unwrap().stage, Stage::Generating);
    }

    #[test]
    fn test_stale_correlation_id_ignored() {
        let store = RunStore::new();
        store.create("proj", "corr-2").unwrap();

        let outcome = store
            .transition(
                "proj",
                "corr-1",
                Stage::Submitted,
                Stage::Generating,
                TransitionUpdate::default(),
            )
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::AlreadyApplied);
        assert_eq!(store.get("proj").unwrap().stage, Stage::Submitted);
    }

    #[test]
    fn test_terminal_run_is_archived_and_frozen() {
        let store = RunStore::new();
        store.create("proj", "corr").unwrap();
        for (from, to) in [
            (Stage::Submitted, Stage::Generating),
            (Stage::Generating, Stage::Built),
            (Stage::Built, Stage::Deploying),
            (Stage::Deploying, Stage::Ready),
        ] {
            store
                .transition("proj", "corr", from, to, TransitionUpdate::default())
                .unwrap();
        }

        let run = store.get("proj").unwrap();
        assert_eq!(run.stage, Stage::Ready);

        // Events arriving after the terminal stage never advance it
        let outcome = store
            .transition(
                "proj",
                "corr",
                Stage::Ready,
                Stage::Failed,
                TransitionUpdate::default(),
            )
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::AlreadyApplied);
        assert_eq!(store.get("proj").unwrap().stage, Stage::Ready);
    }

    #[test]
    fn test_invalid_transition_is_an_error() {
        let store = RunStore::new();
        store.create("proj", "corr").unwrap();

        let result = store.transition(
            "proj",
            "corr",
            Stage::Submitted,
            Stage::Ready,
            TransitionUpdate::default(),
        );
        assert!(matches!(
            result,
            Err(PipelineError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_second_active_run_refused() {
        let store = RunStore::new();
        store.create("proj", "corr-1").unwrap();
        assert!(matches!(
            store.create("proj", "corr-2"),
            Err(PipelineError::RunAlreadyActive(_))
        ));
    }

    #[test]
    fn test_transition_records_error_and_url() {
        let store = RunStore::new();
        store.create("proj", "corr").unwrap();
        store
            .transition(
                "proj",
                "corr",
                Stage::Submitted,
                Stage::Generating,
                TransitionUpdate::default(),
            )
            .unwrap();
        store
            .transition(
                "proj",
                "corr",
                Stage::Generating,
                Stage::Failed,
                TransitionUpdate::error("model produced garbage"),
            )
            .unwrap();

        let run = store.get("proj").unwrap();
        assert_eq!(run.stage, Stage::Failed);
        assert_eq!(run.last_error.as_deref(), Some("model produced garbage"));
    }
}
