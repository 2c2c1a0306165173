//! Connection seam between the engine and tool servers
//!
//! The execution proxy only sees these traits. `RmcpConnector` is the
//! production implementation; `MockConnector` backs the tests.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::ServerConfig;

/// MCP client errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed")]
    Closed,
}

pub type McpResult<T> = Result<T, McpError>;

/// A tool as the upstream server describes it
#[derive(Debug, Clone, PartialEq)]
pub struct RawTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

impl RawTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

impl From<rmcp::model::Tool> for RawTool {
    fn from(tool: rmcp::model::Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()),
            input_schema: Value::Object(tool.input_schema.as_ref().clone()),
        }
    }
}

/// What a tool call returned
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub content: Value,
    /// The tool itself reported failure
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: Value) -> Self {
        Self { content, is_error: false }
    }

    pub fn error(content: Value) -> Self {
        Self { content, is_error: true }
    }

    /// Human-readable failure text
    pub fn error_message(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Null => "tool reported an error".to_string(),
            other => other.to_string(),
        }
    }
}

/// A live session with one tool server
#[async_trait]
pub trait ToolConnection: Send + Sync {
    async fn list_tools(&self) -> McpResult<Vec<RawTool>>;

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolOutput>;

    /// Shut the session down. Closing twice is not an error.
    async fn close(&self) -> McpResult<()>;
}

/// Opens sessions from registry entries
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn connect(&self, server: &str, config: &ServerConfig) -> McpResult<Arc<dyn ToolConnection>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_message() {
        assert_eq!(ToolOutput::error(json!("not allowed")).error_message(), "not allowed");
        assert_eq!(ToolOutput::error(Value::Null).error_message(), "tool reported an error");
        assert_eq!(ToolOutput::error(json!({ "code": 3 })).error_message(), r#"{"code":3}"#);
    }
}
