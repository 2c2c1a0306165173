//! Discovery orchestration
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  DiscoveryEngine                             │
//! │                                              │
//! │  list_servers / search_tools / list_tools    │
//! │       │                                      │
//! │       ▼                                      │
//! │  CachingLayer ──miss──► ToolExecutionProxy   │
//! │       │                   connect + list     │
//! │       ▼                                      │
//! │  ToolMetadataManager (server + tool rules)   │
//! │       │                                      │
//! │       ▼                                      │
//! │  SearchEngine                                │
//! │                                              │
//! │  execute_tool ───────► ToolExecutionProxy    │
//! └──────────────────────────────────────────────┘
//! ```

mod engine;
mod meta_tools;

pub use engine::DiscoveryEngine;
pub use meta_tools::{
    is_meta_tool, meta_tools, EXECUTE_TOOL, GET_TOOL_DETAILS, LIST_MCP_SERVERS, LIST_TOOLS, REFRESH_CACHE,
    SEARCH_TOOLS,
};
