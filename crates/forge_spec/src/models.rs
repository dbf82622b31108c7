//! Data models for the Technical Specification.

use serde::{Deserialize, Serialize};

use crate::error::{SpecError, SpecResult};

/// Root document: the structured build plan for one application.
///
/// Produced by the planning step, consumed by the build executor.
/// Must be a single self-contained object; every collection is
/// present (possibly empty) after deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TechnicalSpecification {
    /// Application name (short, non-empty)
    pub name: String,
    /// One-paragraph description of what is being built
    pub description: String,
    /// Project file tree, top-level entries first
    #[serde(default)]
    pub file_tree: Vec<FileNode>,
    /// UI component descriptors
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
    /// Page descriptors
    #[serde(default)]
    pub pages: Vec<PageSpec>,
    /// API route descriptors
    #[serde(default)]
    pub api_routes: Vec<ApiRouteSpec>,
    /// Persistent data models
    #[serde(default)]
    pub data_models: Vec<DataModelSpec>,
    /// Third-party dependencies
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    /// Environment variables the app expects
    #[serde(default)]
    pub env_vars: Vec<EnvVarSpec>,
}

impl TechnicalSpecification {
    /// Parse a specification from a raw JSON string.
    ///
    /// The input must be the bare JSON object; enclosing prose or
    /// markdown fencing fails the parse.
    pub fn from_json(raw: &str) -> SpecResult<Self> {
        let spec: Self = serde_json::from_str(raw)?;
        Ok(spec)
    }

    /// Serialize the specification to pretty JSON.
    pub fn to_json(&self) -> SpecResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SpecError::Serialization(e.to_string()))
    }
}

/// Kind of a file tree entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Directory,
    File,
}

/// A node in the generated project's file tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileNode {
    pub name: String,
    pub kind: FileKind,
    /// What the file or directory is for
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub children: Vec<FileNode>,
}

impl FileNode {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::File,
            purpose: None,
            children: Vec::new(),
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::Directory,
            purpose: None,
            children: Vec::new(),
        }
    }

    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn with_child(mut self, child: FileNode) -> Self {
        self.children.push(child);
        self
    }

    /// Count nodes in this subtree, including self.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(FileNode::node_count).sum::<usize>()
    }
}

/// A UI component descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentSpec {
    pub name: String,
    #[serde(default)]
    pub props: Vec<PropSpec>,
    /// Names of local state values the component manages
    #[serde(default)]
    pub state: Vec<String>,
    /// Event handler names (onClick, onSubmit, ...)
    #[serde(default)]
    pub event_handlers: Vec<String>,
    /// Accessibility notes (ARIA roles, keyboard behavior)
    #[serde(default)]
    pub accessibility: Option<String>,
}

/// A single component prop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropSpec {
    pub name: String,
    pub prop_type: String,
    #[serde(default)]
    pub required: bool,
}

/// How a page obtains its data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataFetchStrategy {
    #[default]
    Static,
    ServerSide,
    ClientSide,
}

/// A page descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageSpec {
    /// Route path, must start with '/'
    pub route: String,
    pub title: String,
    #[serde(default)]
    pub data_fetching: DataFetchStrategy,
    #[serde(default)]
    pub description: Option<String>,
}

/// HTTP method for an API route.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// An API route descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiRouteSpec {
    pub method: HttpMethod,
    /// Route path, must start with '/'
    pub path: String,
    /// Free-form request shape description (field -> type)
    #[serde(default)]
    pub request_schema: serde_json::Value,
    /// Free-form response shape description
    #[serde(default)]
    pub response_schema: serde_json::Value,
    #[serde(default)]
    pub auth_required: bool,
}

/// A persistent data model descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataModelSpec {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
    /// Field names to index
    #[serde(default)]
    pub indexes: Vec<String>,
}

/// A field on a data model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
}

/// Cardinality of a relation between data models.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToMany,
}

/// A relation from one data model to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelationSpec {
    /// Name of the target data model
    pub to: String,
    pub kind: RelationKind,
}

/// A third-party dependency of the generated app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencySpec {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// An environment variable the generated app reads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvVarSpec {
    /// UPPER_SNAKE_CASE name
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> TechnicalSpecification {
        TechnicalSpecification {
            name: "todo-app".to_string(),
            description: "A todo application with authentication".to_string(),
            file_tree: vec![FileNode::directory("src")
                .with_purpose("Application source")
                .with_child(FileNode::file("index.ts"))],
            components: vec![ComponentSpec {
                name: "TodoList".to_string(),
                props: vec![PropSpec {
                    name: "items".to_string(),
                    prop_type: "Todo[]".to_string(),
                    required: true,
                }],
                state: vec!["filter".to_string()],
                event_handlers: vec!["onToggle".to_string()],
                accessibility: Some("list with aria-live updates".to_string()),
            }],
            pages: vec![PageSpec {
                route: "/".to_string(),
                title: "Home".to_string(),
                data_fetching: DataFetchStrategy::ServerSide,
                description: None,
            }],
            api_routes: vec![ApiRouteSpec {
                method: HttpMethod::Post,
                path: "/api/todos".to_string(),
                request_schema: serde_json::json!({"title": "string"}),
                response_schema: serde_json::json!({"id": "string"}),
                auth_required: true,
            }],
            data_models: vec![DataModelSpec {
                name: "Todo".to_string(),
                fields: vec![FieldSpec {
                    name: "title".to_string(),
                    field_type: "string".to_string(),
                    required: true,
                    unique: false,
                }],
                relations: vec![RelationSpec {
                    to: "User".to_string(),
                    kind: RelationKind::OneToMany,
                }],
                indexes: vec!["title".to_string()],
            }],
            dependencies: vec![DependencySpec {
                name: "next".to_string(),
                version: Some("14".to_string()),
            }],
            env_vars: vec![EnvVarSpec {
                name: "DATABASE_URL".to_string(),
                description: None,
                required: true,
            }],
        }
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let spec = sample_spec();
        let json = spec.to_json().unwrap();
        let parsed = TechnicalSpecification::from_json(&json).unwrap();
        assert_eq!(spec, parsed);
    }

    #[test]
    fn test_prose_wrapped_json_fails_parse() {
        let raw = "Here is your spec:\n{\"name\": \"x\", \"description\": \"y\"}";
        assert!(TechnicalSpecification::from_json(raw).is_err());
    }

    #[test]
    fn test_missing_collections_default_to_empty() {
        let raw = r#"{"name": "x", "description": "y"}"#;
        let spec = TechnicalSpecification::from_json(raw).unwrap();
        assert!(spec.pages.is_empty());
        assert!(spec.data_models.is_empty());
    }

    #[test]
    fn test_file_node_count() {
        let tree = FileNode::directory("src")
            .with_child(FileNode::file("a.ts"))
            .with_child(FileNode::directory("lib").with_child(FileNode::file("b.ts")));
        assert_eq!(tree.node_count(), 4);
    }
}
