//! The planning step itself: validate input, invoke the model,
//! enforce the output contract with one corrective retry.

use std::sync::Arc;

use forge_spec::{SpecValidator, TechnicalSpecification};
use tracing::{debug, info, warn};

use crate::client::ModelClient;
use crate::error::{PlannerError, PlannerResult};
use crate::prompt::{self, MAX_PROMPT_LEN, SYSTEM_INSTRUCTION};

/// Input to the planning step.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub prompt: String,
    pub asset_notes: Vec<String>,
}

impl PlanRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            asset_notes: Vec::new(),
        }
    }

    pub fn with_asset_note(mut self, note: impl Into<String>) -> Self {
        self.asset_notes.push(note.into());
        self
    }
}

/// Specification producer.
///
/// The step is pure given its inputs aside from the model calls,
/// which keeps it safely re-executable under the job queue's
/// at-least-once delivery.
pub struct Planner {
    client: Arc<dyn ModelClient>,
}

impl Planner {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    /// Produce a Technical Specification from a prompt.
    ///
    /// Issues at most two model calls: the original request and, if
    /// its output fails the schema contract, exactly one corrective
    /// re-request. A second malformed response is terminal.
    pub async fn plan(&self, request: &PlanRequest) -> PlannerResult<TechnicalSpecification> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(PlannerError::PromptRejected("prompt is empty".to_string()));
        }
        if prompt.len() > MAX_PROMPT_LEN {
            return Err(PlannerError::PromptRejected(format!(
                "prompt exceeds {} bytes",
                MAX_PROMPT_LEN
            )));
        }

        let user = prompt::user_content(prompt, &request.asset_notes);
        debug!(prompt_len = prompt.len(), "requesting specification");

        let raw = self.client.complete(SYSTEM_INSTRUCTION, &user).await?;
        let first_error = match SpecValidator::parse_and_validate(&raw) {
            Ok(spec) => {
                info!(name = %spec.name, "specification accepted on first attempt");
                return Ok(spec);
            }
            Err(e) => e.to_string(),
        };

        warn!(error = %first_error, "malformed specification, issuing corrective request");
        let corrective = prompt::corrective_content(prompt, &request.asset_notes, &first_error);
        let raw = self.client.complete(SYSTEM_INSTRUCTION, &corrective).await?;

        match SpecValidator::parse_and_validate(&raw) {
            Ok(spec) => {
                info!(name = %spec.name, "specification accepted on corrective attempt");
                Ok(spec)
            }
            Err(e) => Err(PlannerError::SpecificationGenerationFailed {
                attempts: 2,
                reason: e.to_string(),
            }),
        }
    }
}
