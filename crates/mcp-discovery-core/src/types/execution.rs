//! Execution outcomes and the structured error taxonomy

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Machine-readable error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Arguments missing or not a JSON object
    InvalidArguments,
    /// Server unknown, unreachable, or not in the connected state
    ServerNotConnected,
    /// Transport failure or tool-reported error
    ExecutionFailed,
    /// An upstream call outlived its deadline
    Timeout,
    /// No tool by that name in the server's catalog
    ToolNotFound,
    /// Tool (or its server) disabled by rules or configuration
    ToolDisabled,
    /// Discovery turned off in configuration
    DiscoveryDisabled,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArguments => "INVALID_ARGUMENTS",
            ErrorCode::ServerNotConnected => "SERVER_NOT_CONNECTED",
            ErrorCode::ExecutionFailed => "EXECUTION_FAILED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::ToolNotFound => "TOOL_NOT_FOUND",
            ErrorCode::ToolDisabled => "TOOL_DISABLED",
            ErrorCode::DiscoveryDisabled => "DISCOVERY_DISABLED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure detail for a tool call. Always names the server and tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub code: ErrorCode,
    pub message: String,
    pub server: String,
    pub tool: String,
}

/// Outcome of a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
}

impl ExecutionResult {
    pub fn success(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(
        code: ErrorCode,
        server: impl Into<String>,
        tool: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(ExecutionError {
                code,
                message: message.into(),
                server: server.into(),
                tool: tool.into(),
            }),
        }
    }

    /// Error code, if this is a failure
    pub fn code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}
