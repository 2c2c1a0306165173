//! Tool descriptors and catalog entries

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Maximum length of a derived tool summary, in characters
pub const SUMMARY_MAX_CHARS: usize = 120;

/// A tool definition exposed to an agent (name, description, JSON schema)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON Schema for the input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl Tool {
    /// Create a tool that takes no arguments
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: json!({ "type": "object", "properties": {} }),
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// One parameter derived from a tool's input schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParameter {
    /// Derive parameters from a JSON object schema. Non-object schemas
    /// yield no parameters.
    pub fn from_schema(schema: &Value) -> Vec<ToolParameter> {
        let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
            return Vec::new();
        };
        let required: Vec<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        properties
            .iter()
            .map(|(name, prop)| ToolParameter {
                name: name.clone(),
                param_type: match prop.get("type") {
                    Some(Value::String(t)) => t.clone(),
                    // ["string", "null"] style unions keep their first member
                    Some(Value::Array(types)) => types
                        .iter()
                        .find_map(Value::as_str)
                        .unwrap_or("string")
                        .to_string(),
                    _ => "string".to_string(),
                },
                description: prop
                    .get("description")
                    .or_else(|| prop.get("title"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                required: required.contains(&name.as_str()),
                default: prop.get("default").cloned(),
            })
            .collect()
    }
}

/// A catalog entry for one tool on one server
///
/// Entries are rebuilt from the upstream descriptor on every refresh and
/// never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub server: String,
    /// Exposed name (server prefix + upstream name)
    pub name: String,
    /// Name the upstream server knows the tool by
    #[serde(rename = "upstreamName")]
    pub upstream_name: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ToolMetadata {
    /// Agent-facing definition of this tool
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: self.description.clone().unwrap_or_else(|| self.summary.clone()),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// First non-empty line of `description`, trimmed and cut to
/// [`SUMMARY_MAX_CHARS`] characters
pub fn summarize(description: Option<&str>) -> String {
    let line = description
        .and_then(|d| d.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or_default();

    if line.chars().count() <= SUMMARY_MAX_CHARS {
        return line.to_string();
    }
    let mut cut: String = line.chars().take(SUMMARY_MAX_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_from_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "owner": { "type": "string", "description": "Repository owner" },
                "per_page": { "type": "integer", "default": 30, "title": "Page size" },
                "state": { "type": ["string", "null"] },
                "raw": {}
            },
            "required": ["owner"]
        });

        let params = ToolParameter::from_schema(&schema);
        assert_eq!(params.len(), 4);

        let owner = params.iter().find(|p| p.name == "owner").unwrap();
        assert!(owner.required);
        assert_eq!(owner.description.as_deref(), Some("Repository owner"));

        let per_page = params.iter().find(|p| p.name == "per_page").unwrap();
        assert_eq!(per_page.param_type, "integer");
        assert_eq!(per_page.description.as_deref(), Some("Page size"));
        assert_eq!(per_page.default, Some(json!(30)));
        assert!(!per_page.required);

        assert_eq!(params.iter().find(|p| p.name == "state").unwrap().param_type, "string");
        assert_eq!(params.iter().find(|p| p.name == "raw").unwrap().param_type, "string");

        assert!(ToolParameter::from_schema(&json!({ "type": "string" })).is_empty());
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize(None), "");
        assert_eq!(summarize(Some("\n  Create an issue.  \nMore detail.")), "Create an issue.");

        let long = "x".repeat(300);
        let summary = summarize(Some(&long));
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_tool_definition_from_metadata() {
        let meta = ToolMetadata {
            server: "github".into(),
            name: "gh_create_issue".into(),
            upstream_name: "create_issue".into(),
            summary: "Create an issue".into(),
            description: None,
            input_schema: json!({ "type": "object" }),
            parameters: Vec::new(),
            enabled: true,
            tags: Vec::new(),
        };

        let tool = meta.to_tool();
        assert_eq!(tool.name, "gh_create_issue");
        assert_eq!(tool.description, "Create an issue");

        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["upstreamName"], "create_issue");
        assert!(value.get("description").is_none());
    }
}
