//! # forge_spec
//!
//! Technical Specification data model for AppForge.
//!
//! A Technical Specification is the structured build plan produced by
//! the planning step from a natural-language prompt: a file tree, UI
//! component descriptors, page descriptors, API route descriptors,
//! data models, dependencies and environment variables.
//!
//! The document is all-or-nothing: a spec either satisfies the schema
//! and the structural rules enforced by [`SpecValidator`], or it is
//! rejected whole. Partial or narrative output is never accepted.

pub mod error;
pub mod models;
pub mod validator;

pub use error::{SpecError, SpecResult};
pub use models::{
    ApiRouteSpec, ComponentSpec, DataFetchStrategy, DataModelSpec, DependencySpec, EnvVarSpec,
    FieldSpec, FileKind, FileNode, HttpMethod, PageSpec, PropSpec, RelationKind, RelationSpec,
    TechnicalSpecification,
};
pub use validator::{SpecValidator, ValidationResult};
