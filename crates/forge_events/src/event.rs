//! Typed progress events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a progress event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Planning-step reasoning and status
    Thought,
    /// Build activity
    Build,
    /// Self-healing activity
    Healing,
    /// Deployment activity
    Deployment,
    /// Generic stage progress
    Progress,
    /// Terminal or recoverable error
    Error,
    /// Terminal success
    Success,
    /// Infrastructure notices
    System,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thought => "thought",
            Self::Build => "build",
            Self::Healing => "healing",
            Self::Deployment => "deployment",
            Self::Progress => "progress",
            Self::Error => "error",
            Self::Success => "success",
            Self::System => "system",
        }
    }
}

/// A single progress notification for one project.
///
/// Delivery order is best-effort; consumers must treat `timestamp` as
/// authoritative for ordering, not arrival order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    pub project_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl ProgressEvent {
    /// Create an event stamped with the current time.
    pub fn new(
        project_id: impl Into<String>,
        event_type: EventType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            event_type,
            message: message.into(),
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach structured metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}
