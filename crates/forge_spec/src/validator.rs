//! Structural validation for Technical Specifications.

use std::collections::HashSet;

use crate::error::{SpecError, SpecResult};
use crate::models::TechnicalSpecification;

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Collapse errors into a single message for error reporting.
    pub fn error_summary(&self) -> String {
        self.errors.join("; ")
    }
}

/// Validator for Technical Specifications.
pub struct SpecValidator;

impl SpecValidator {
    /// Validate an entire specification.
    pub fn validate(spec: &TechnicalSpecification) -> ValidationResult {
        let mut result = ValidationResult::new();

        if spec.name.trim().is_empty() {
            result.add_error("Specification name cannot be empty");
        }
        if spec.description.trim().is_empty() {
            result.add_error("Specification description cannot be empty");
        }

        if spec.pages.is_empty() {
            result.add_error("Specification must declare at least one page");
        }
        if spec.data_models.is_empty() {
            result.add_error("Specification must declare at least one data model");
        }

        result.merge(Self::validate_routes(spec));
        result.merge(Self::validate_names(spec));
        result.merge(Self::validate_relations(spec));
        result.merge(Self::validate_env_vars(spec));

        result
    }

    /// Parse raw model output and validate it in one step.
    ///
    /// This is the contract the planning step holds the model to: the
    /// raw response must be the bare schema object and must pass
    /// structural validation. Warnings are tolerated, errors are not.
    pub fn parse_and_validate(raw: &str) -> SpecResult<TechnicalSpecification> {
        let spec = TechnicalSpecification::from_json(raw)?;
        let result = Self::validate(&spec);
        if !result.valid {
            return Err(SpecError::Invalid(result.error_summary()));
        }
        Ok(spec)
    }

    fn validate_routes(spec: &TechnicalSpecification) -> ValidationResult {
        let mut result = ValidationResult::new();

        for page in &spec.pages {
            if !page.route.starts_with('/') {
                result.add_error(format!("Page route '{}' must start with '/'", page.route));
            }
            if page.title.trim().is_empty() {
                result.add_error(format!("Page '{}' has empty title", page.route));
            }
        }

        for route in &spec.api_routes {
            if !route.path.starts_with('/') {
                result.add_error(format!("API route '{}' must start with '/'", route.path));
            }
        }

        result
    }

    fn validate_names(spec: &TechnicalSpecification) -> ValidationResult {
        let mut result = ValidationResult::new();

        let mut component_names = HashSet::new();
        for component in &spec.components {
            if component.name.trim().is_empty() {
                result.add_error("Component with empty name");
                continue;
            }
            if !component_names.insert(component.name.as_str()) {
                result.add_error(format!("Duplicate component name: {}", component.name));
            }
            if component.accessibility.is_none() {
                result.add_warning(format!(
                    "Component '{}' has no accessibility notes",
                    component.name
                ));
            }
        }

        let mut model_names = HashSet::new();
        for model in &spec.data_models {
            if model.name.trim().is_empty() {
                result.add_error("Data model with empty name");
                continue;
            }
            if !model_names.insert(model.name.as_str()) {
                result.add_error(format!("Duplicate data model name: {}", model.name));
            }
            if model.fields.is_empty() {
                result.add_error(format!("Data model '{}' has no fields", model.name));
            }
            for index in &model.indexes {
                if !model.fields.iter().any(|f| &f.name == index) {
                    result.add_warning(format!(
                        "Data model '{}' indexes unknown field '{}'",
                        model.name, index
                    ));
                }
            }
        }

        result
    }

    fn validate_relations(spec: &TechnicalSpecification) -> ValidationResult {
        let mut result = ValidationResult::new();

        let model_names: HashSet<&str> =
            spec.data_models.iter().map(|m| m.name.as_str()).collect();

        for model in &spec.data_models {
            for relation in &model.relations {
                if !model_names.contains(relation.to.as_str()) {
                    result.add_error(format!(
                        "Data model '{}' has relation to unknown model '{}'",
                        model.name, relation.to
                    ));
                }
            }
        }

        result
    }

    fn validate_env_vars(spec: &TechnicalSpecification) -> ValidationResult {
        let mut result = ValidationResult::new();

        for var in &spec.env_vars {
            let well_formed = !var.name.is_empty()
                && var
                    .name
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
            if !well_formed {
                result.add_error(format!(
                    "Environment variable '{}' is not UPPER_SNAKE_CASE",
                    var.name
                ));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DataModelSpec, EnvVarSpec, FieldSpec, PageSpec, RelationKind, RelationSpec,
    };

    fn minimal_spec() -> TechnicalSpecification {
        TechnicalSpecification {
            name: "app".to_string(),
            description: "An app".to_string(),
            file_tree: Vec::new(),
            components: Vec::new(),
            pages: vec![PageSpec {
                route: "/".to_string(),
                title: "Home".to_string(),
                data_fetching: Default::default(),
                description: None,
            }],
            api_routes: Vec::new(),
            data_models: vec![DataModelSpec {
                name: "User".to_string(),
                fields: vec![FieldSpec {
                    name: "email".to_string(),
                    field_type: "string".to_string(),
                    required: true,
                    unique: true,
                }],
                relations: Vec::new(),
                indexes: Vec::new(),
            }],
            dependencies: Vec::new(),
            env_vars: Vec::new(),
        }
    }

    #[test]
    fn test_minimal_spec_is_valid() {
        let result = SpecValidator::validate(&minimal_spec());
        assert!(result.valid, "errors: {:?}", result.errors);
    }

    #[test]
    fn test_missing_pages_is_invalid() {
        let mut spec = minimal_spec();
        spec.pages.clear();
        let result = SpecValidator::validate(&spec);
        assert!(!result.valid);
    }

    #[test]
    fn test_relation_to_unknown_model_is_invalid() {
        let mut spec = minimal_spec();
        spec.data_models[0].relations.push(RelationSpec {
            to: "Ghost".to_string(),
            kind: RelationKind::OneToMany,
        });
        let result = SpecValidator::validate(&spec);
        assert!(!result.valid);
        assert!(result.errors[0].contains("Ghost"));
    }

    #[test]
    fn test_bad_env_var_name_is_invalid() {
        let mut spec = minimal_spec();
        spec.env_vars.push(EnvVarSpec {
            name: "database-url".to_string(),
            description: None,
            required: true,
        });
        let result = SpecValidator::validate(&spec);
        assert!(!result.valid);
    }

    #[test]
    fn test_bad_route_is_invalid() {
        let mut spec = minimal_spec();
        spec.pages[0].route = "home".to_string();
        let result = SpecValidator::validate(&spec);
        assert!(!result.valid);
    }

    #[test]
    fn test_parse_and_validate_rejects_schema_violations() {
        // Parses as JSON but has no pages or data models
        let raw = r#"{"name": "x", "description": "y"}"#;
        let err = SpecValidator::parse_and_validate(raw).unwrap_err();
        assert!(matches!(err, SpecError::Invalid(_)));
    }
}
