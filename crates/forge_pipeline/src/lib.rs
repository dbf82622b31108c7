//! # forge_pipeline
//!
//! The generation pipeline: tracks a project's journey from submitted
//! prompt to live deployment and drives it through the queued
//! generation, build and deployment stages.
//!
//! # Architecture
//!
//! - **Run store**: authoritative per-project stage record, mutated
//!   only through guarded stage transitions
//! - **Producers**: the enqueue API that funnels typed payloads into
//!   the named queues with the right priorities and ids
//! - **Executors**: contracts for the external build and deploy
//!   collaborators, plus scripted fakes for tests and offline runs
//! - **Healing**: bounded automated repair attempts on build failure
//! - **Orchestrator**: job handlers translating queue completion and
//!   failure into next-stage submissions and progress events

pub mod config;
pub mod error;
pub mod executors;
pub mod healing;
pub mod jobs;
pub mod mock;
pub mod orchestrator;
pub mod run;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use executors::{
    BuildExecutor, BuildOutcome, BuildRequest, DeployExecutor, DeployOutcome, DeployRequest,
    DeployTarget, ExecutorError,
};
pub use healing::{
    AttemptOutcome, HealingAttempt, HealingLog, HealingPolicy, RepairAction, RepairAdvisor,
    RepairKind, RuleBasedAdvisor,
};
pub use jobs::{
    AiTaskJobPayload, BuildJobPayload, DeployJobPayload, GenerationJobPayload, JobProducer,
    NotificationJobPayload,
};
pub use mock::{ScriptedBuildExecutor, ScriptedDeployExecutor};
pub use orchestrator::PipelineOrchestrator;
pub use run::{PipelineRun, RunStore, Stage, TransitionOutcome, TransitionUpdate};
