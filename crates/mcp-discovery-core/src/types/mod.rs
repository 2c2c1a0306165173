//! Shared data model
//!
//! Records returned across the public API. Everything serializes with the
//! camelCase keys agents and configuration files use.

mod execution;
mod search;
mod server;
mod tool;

pub use execution::{ErrorCode, ExecutionError, ExecutionResult};
pub use search::{SearchOptions, SearchResult, DEFAULT_SEARCH_LIMIT};
pub use server::{ConnectionStatus, PartialResult, ServerError, ServerMetadata};
pub use tool::{summarize, Tool, ToolMetadata, ToolParameter, SUMMARY_MAX_CHARS};
