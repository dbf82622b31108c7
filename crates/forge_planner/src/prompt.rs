//! Prompt construction for the planning step.

/// Upper bound on accepted prompt length, in bytes.
pub const MAX_PROMPT_LEN: usize = 10_000;

/// Fixed system instruction: role, output-schema contract, and the
/// non-functional checklist the specification must account for.
pub const SYSTEM_INSTRUCTION: &str = "\
You are a senior software architect producing a build specification \
for a web application from a product description.

Respond with a single JSON object and nothing else: no prose, no \
markdown fencing, no commentary before or after. The object must have \
exactly these top-level fields:

- \"name\": short application name (string)
- \"description\": one-paragraph summary (string)
- \"file_tree\": array of nodes {\"name\", \"kind\": \"directory\"|\"file\", \"purpose\"?, \"children\"?}
- \"components\": array of {\"name\", \"props\": [{\"name\", \"prop_type\", \"required\"}], \"state\": [string], \"event_handlers\": [string], \"accessibility\"?}
- \"pages\": array of {\"route\", \"title\", \"data_fetching\": \"static\"|\"server_side\"|\"client_side\", \"description\"?}
- \"api_routes\": array of {\"method\": \"GET\"|\"POST\"|\"PUT\"|\"PATCH\"|\"DELETE\", \"path\", \"request_schema\", \"response_schema\", \"auth_required\"}
- \"data_models\": array of {\"name\", \"fields\": [{\"name\", \"field_type\", \"required\", \"unique\"}], \"relations\": [{\"to\", \"kind\": \"one_to_one\"|\"one_to_many\"|\"many_to_many\"}], \"indexes\": [string]}
- \"dependencies\": array of {\"name\", \"version\"?}
- \"env_vars\": array of {\"name\" (UPPER_SNAKE_CASE), \"description\"?, \"required\"}

Declare at least one page and at least one data model. Routes start \
with '/'. Relations must reference declared data models.

Account for security (authentication, input validation, secrets via \
env vars), accessibility (notes per interactive component) and \
scalability (indexes on queried fields, sensible data-fetching \
strategies).";

/// Assemble the user content from the prompt and asset descriptions.
pub fn user_content(prompt: &str, asset_notes: &[String]) -> String {
    if asset_notes.is_empty() {
        return prompt.to_string();
    }

    let mut parts = vec![prompt.to_string(), "\nProvided assets:".to_string()];
    for note in asset_notes {
        parts.push(format!("- {}", note));
    }
    parts.join("\n")
}

/// Assemble the corrective re-request after a malformed response.
///
/// Carries the original request plus the specific parse/validation
/// error, and demands pure schema-conformant output.
pub fn corrective_content(prompt: &str, asset_notes: &[String], error: &str) -> String {
    format!(
        "{}\n\nYour previous response was rejected: {}\n\n\
         Respond again with ONLY the JSON object satisfying the schema \
         from the system instruction. Do not include any text outside \
         the JSON object.",
        user_content(prompt, asset_notes),
        error
    )
}
