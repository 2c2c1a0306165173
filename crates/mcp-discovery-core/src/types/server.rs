//! Server metadata and per-server failure reporting

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::execution::ErrorCode;

/// Connection state as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Connecting,
    Disconnected,
    Error,
}

/// A registered tool server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Where the server definition came from (e.g. "claude-desktop")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub enabled: bool,
    pub tags: Vec<String>,
    #[serde(rename = "toolCount")]
    pub tool_count: usize,
    #[serde(rename = "enabledCount")]
    pub enabled_count: usize,
    pub status: ConnectionStatus,
    /// Last connection or enumeration error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Failure of one server inside a multi-server operation
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("[{code}] {server}: {message}")]
pub struct ServerError {
    pub server: String,
    pub code: ErrorCode,
    pub message: String,
}

impl ServerError {
    pub fn new(server: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            code,
            message: message.into(),
        }
    }
}

/// Items gathered from every server that answered, plus the failures of
/// those that did not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResult<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub errors: Vec<ServerError>,
}

impl<T> Default for PartialResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> PartialResult<T> {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}
