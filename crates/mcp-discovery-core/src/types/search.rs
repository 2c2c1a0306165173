//! Search request options and ranked results

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default number of search results
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Restrict to one server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Maximum results (default 10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Also rank disabled tools and tools of disabled servers
    #[serde(rename = "includeDisabled", default)]
    pub include_disabled: bool,
    /// Attach each tool's input schema to its result
    #[serde(rename = "includeSchema", default)]
    pub include_schema: bool,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn include_disabled(mut self, include: bool) -> Self {
        self.include_disabled = include;
        self
    }

    pub fn include_schema(mut self, include: bool) -> Self {
        self.include_schema = include;
        self
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)
    }
}

/// A ranked tool match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub server: String,
    pub tool: String,
    pub summary: String,
    pub relevance: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "inputSchema", default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}
