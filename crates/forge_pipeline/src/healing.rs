//! Self-healing: bounded automated repair on build failure.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Healing budget per build-failure episode.
#[derive(Debug, Clone, Copy)]
pub struct HealingPolicy {
    pub max_attempts: u32,
}

impl Default for HealingPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl HealingPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

/// What became of one repair attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// A fresh build job was submitted with the proposed action
    Resubmitted,
    /// The budget was exhausted; the run fails terminally
    Exhausted,
}

/// Record of one automated repair attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealingAttempt {
    pub project_id: String,
    /// 1-based within the current build-failure episode
    pub attempt_number: u32,
    pub cause: String,
    pub action: String,
    pub outcome: AttemptOutcome,
}

/// Category of a proposed repair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepairKind {
    DependencyFix,
    SyntaxFix,
    Retry,
}

/// A corrective action proposed for a failed build.
///
/// The action is advisory: executing it is the build collaborator's
/// concern, threaded through as a repair hint on the re-submitted
/// build request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepairAction {
    pub kind: RepairKind,
    pub description: String,
}

/// Proposes a repair action for a build-failure cause.
///
/// How actions are chosen is delegated; implementations may be
/// rule-based or call out to a model.
#[async_trait]
pub trait RepairAdvisor: Send + Sync {
    async fn propose(&self, cause: &str) -> RepairAction;
}

/// Rule-based advisor classifying the failure cause text.
pub struct RuleBasedAdvisor {
    dependency: Regex,
    syntax: Regex,
}

impl RuleBasedAdvisor {
    pub fn new() -> Self {
        Self {
            dependency: Regex::new(
                r"(?i)missing dependency|cannot find module|unresolved import|package .* not found",
            )
            .expect("static pattern"),
            syntax: Regex::new(r"(?i)syntax error|unexpected token|parse error")
                .expect("static pattern"),
        }
    }
}

impl Default for RuleBasedAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RepairAdvisor for RuleBasedAdvisor {
    async fn propose(&self, cause: &str) -> RepairAction {
        let action = if self.dependency.is_match(cause) {
            RepairAction {
                kind: RepairKind::DependencyFix,
                description: "add the missing dependency to the manifest and rebuild".to_string(),
            }
        } else if self.syntax.is_match(cause) {
            RepairAction {
                kind: RepairKind::SyntaxFix,
                description: "regenerate the offending file to correct the syntax error"
                    .to_string(),
            }
        } else {
            RepairAction {
                kind: RepairKind::Retry,
                description: "rebuild from the existing specification".to_string(),
            }
        };
        debug!(cause, kind = ?action.kind, "repair action proposed");
        action
    }
}

/// Per-project log of healing attempts.
///
/// Attempts exist only within one build-failure episode: the log is
/// cleared when a build finally succeeds.
#[derive(Default)]
pub struct HealingLog {
    attempts: Mutex<HashMap<String, Vec<HealingAttempt>>>,
}

impl HealingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts recorded for the current episode.
    pub fn count(&self, project_id: &str) -> u32 {
        self.attempts
            .lock()
            .get(project_id)
            .map(|a| a.len() as u32)
            .unwrap_or(0)
    }

    pub fn record(&self, attempt: HealingAttempt) {
        self.attempts
            .lock()
            .entry(attempt.project_id.clone())
            .or_default()
            .push(attempt);
    }

    /// Close the episode without a further resubmission: the last
    /// recorded attempt's repair also failed and the budget is spent.
    /// The log never grows past the budget; exhaustion re-marks the
    /// final attempt rather than appending a new one.
    pub fn mark_exhausted(&self, project_id: &str) {
        if let Some(attempts) = self.attempts.lock().get_mut(project_id) {
            if let Some(last) = attempts.last_mut() {
                last.outcome = AttemptOutcome::Exhausted;
            }
        }
    }

    /// Snapshot of the current episode's attempts.
    pub fn attempts(&self, project_id: &str) -> Vec<HealingAttempt> {
        self.attempts
            .lock()
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Close the episode after a successful build.
    pub fn clear(&self, project_id: &str) {
        self.attempts.lock().remove(project_id);
    }
}
