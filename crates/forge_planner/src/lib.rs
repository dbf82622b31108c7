//! # forge_planner
//!
//! The planning step of the AppForge pipeline: one call to a
//! generative model turns a natural-language prompt (plus optional
//! asset descriptions) into a [`forge_spec::TechnicalSpecification`].
//!
//! The output contract is strict: the raw model response must parse
//! directly as the specification schema, with no enclosing prose. On a
//! malformed response the planner issues exactly one corrective
//! re-request carrying the parse error; a second failure is surfaced
//! as [`PlannerError::SpecificationGenerationFailed`] and is terminal
//! for the pipeline run. The retry budget here is deliberately fixed
//! at one and is distinct from the job queue's own attempt counter.

pub mod client;
pub mod error;
pub mod planner;
pub mod prompt;

pub use client::{LlmClient, LlmProvider, ModelClient, StaticModelClient};
pub use error::{PlannerError, PlannerResult};
pub use planner::{PlanRequest, Planner};
