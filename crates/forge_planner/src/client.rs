//! Model invocation interface and concrete clients.
//!
//! The pipeline treats the model as an opaque capability: one
//! request/response call taking a system instruction plus user
//! content and returning raw text. Provider identity is resolved here,
//! from the environment.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PlannerError, PlannerResult};

/// Single request/response call against a generative model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> PlannerResult<String>;
}

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

/// HTTP client for the OpenAI and Anthropic chat APIs.
pub struct LlmClient {
    provider: LlmProvider,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

/// Transient-error retries inside one model call (5xx, 429, network).
const MAX_TRANSIENT_RETRIES: u32 = 3;

impl LlmClient {
    /// Create a client with explicit configuration.
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>) -> Self {
        let default_model = match provider {
            LlmProvider::OpenAI => "gpt-5-mini".to_string(),
            LlmProvider::Anthropic => "claude-sonnet-4.5".to_string(),
        };

        Self {
            provider,
            api_key,
            model: model.unwrap_or(default_model),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from environment variables.
    ///
    /// Checks in order:
    /// 1. OPENAI_API_KEY
    /// 2. ANTHROPIC_API_KEY
    ///
    /// `FORGE_LLM_MODEL` overrides the provider's default model.
    pub fn from_env() -> PlannerResult<Self> {
        let custom_model = std::env::var("FORGE_LLM_MODEL").ok();

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::OpenAI, api_key, custom_model));
            }
        }

        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            if !api_key.is_empty() {
                return Ok(Self::new(LlmProvider::Anthropic, api_key, custom_model));
            }
        }

        Err(PlannerError::ModelNotConfigured)
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete_openai(&self, system: &str, user: &str) -> PlannerResult<String> {
        let url = "https://api.openai.com/v1/chat/completions";

        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            max_completion_tokens: Some(8192),
        };

        let mut last_error = None;

        for attempt in 0..MAX_TRANSIENT_RETRIES {
            if attempt > 0 {
                let delay = std::time::Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(PlannerError::Model(format!("Network error: {}", e)));
                    continue;
                }
            };

            let status = response.status();

            if status.is_server_error() || status.as_u16() == 429 {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, attempt, "transient OpenAI error, retrying");
                last_error = Some(PlannerError::Model(format!(
                    "OpenAI API error {} (attempt {}/{}): {}",
                    status,
                    attempt + 1,
                    MAX_TRANSIENT_RETRIES,
                    body
                )));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(PlannerError::Model(format!(
                    "OpenAI API error {}: {}",
                    status, body
                )));
            }

            let result: OpenAIResponse = response
                .json()
                .await
                .map_err(|e| PlannerError::Model(format!("Failed to parse response: {}", e)))?;

            return result
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| PlannerError::Model("No response from OpenAI".to_string()));
        }

        Err(last_error.unwrap_or_else(|| PlannerError::Model("Max retries exceeded".to_string())))
    }

    async fn complete_anthropic(&self, system: &str, user: &str) -> PlannerResult<String> {
        let url = "https://api.anthropic.com/v1/messages";

        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: 8192,
            system: Some(system.to_string()),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let mut last_error = None;

        for attempt in 0..MAX_TRANSIENT_RETRIES {
            if attempt > 0 {
                let delay = std::time::Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("Content-Type", "application/json")
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(PlannerError::Model(format!("Network error: {}", e)));
                    continue;
                }
            };

            let status = response.status();

            if status.is_server_error() || status.as_u16() == 429 {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, attempt, "transient Anthropic error, retrying");
                last_error = Some(PlannerError::Model(format!(
                    "Anthropic API error {} (attempt {}/{}): {}",
                    status,
                    attempt + 1,
                    MAX_TRANSIENT_RETRIES,
                    body
                )));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(PlannerError::Model(format!(
                    "Anthropic API error {}: {}",
                    status, body
                )));
            }

            let result: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| PlannerError::Model(format!("Failed to parse response: {}", e)))?;

            return result
                .content
                .into_iter()
                .next()
                .map(|c| c.text)
                .ok_or_else(|| PlannerError::Model("No response from Anthropic".to_string()));
        }

        Err(last_error.unwrap_or_else(|| PlannerError::Model("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl ModelClient for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> PlannerResult<String> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_openai(system, user).await,
            LlmProvider::Anthropic => self.complete_anthropic(system, user).await,
        }
    }
}

/// Client returning canned responses, in order. The last response
/// repeats once the queue is drained. For offline runs and demos.
pub struct StaticModelClient {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
}

impl StaticModelClient {
    pub fn new(responses: impl IntoIterator<Item = String>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            last: Mutex::new(None),
        }
    }

    pub fn single(response: impl Into<String>) -> Self {
        Self::new([response.into()])
    }
}

#[async_trait]
impl ModelClient for StaticModelClient {
    async fn complete(&self, _system: &str, _user: &str) -> PlannerResult<String> {
        if let Some(next) = self.responses.lock().pop_front() {
            *self.last.lock() = Some(next.clone());
            return Ok(next);
        }
        self.last
            .lock()
            .clone()
            .ok_or_else(|| PlannerError::Model("No canned response configured".to_string()))
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}
