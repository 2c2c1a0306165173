//! MCP Discovery Core
//!
//! Tool discovery and policy engine for MCP tool servers. Instead of
//! handing an agent every tool of every server, the engine keeps a
//! rule-filtered catalog, ranks it against free-text queries and proxies
//! calls to the right server.
//!
//! ## Components
//!
//! - `patterns`: glob and `/regex/flags` tool name patterns
//! - `rules`: declarative `when`/`set`/`push` rules over servers and tools
//! - `cache`: TTL cache with single-flight recomputation
//! - `execution`: per-server connection state and tool invocation
//! - `tools`: per-server catalogs and search
//! - `discovery`: the orchestrating engine and agent meta-tools
//!
//! ```rust,ignore
//! use mcp_discovery_core::{DiscoveryEngine, FileConfigProvider, RmcpConnector, SearchOptions};
//!
//! let logger = mcp_discovery_core::logging::default_logger();
//! let provider = Arc::new(FileConfigProvider::user());
//! let engine = DiscoveryEngine::from_provider(provider, Arc::new(RmcpConnector::new(logger.clone())), logger).await?;
//!
//! let found = engine.search_tools("open a pull request", &SearchOptions::new()).await;
//! for hit in &found.items {
//!     println!("{}/{} ({:.1})", hit.server, hit.tool, hit.relevance);
//! }
//!
//! engine.dispose().await;
//! ```

pub mod types;
pub mod logging;
pub mod config;
pub mod patterns;
pub mod rules;
pub mod cache;
pub mod mcp;
pub mod execution;
pub mod tools;
pub mod discovery;

// Re-export commonly used types
pub use types::{
    ConnectionStatus, ErrorCode, ExecutionError, ExecutionResult, PartialResult, SearchOptions,
    SearchResult, ServerError, ServerMetadata, Tool, ToolMetadata, ToolParameter,
};

pub use logging::{ConsoleLogger, FileLogger, Logger, NoOpLogger};

pub use config::{
    CompiledConfig, ConfigError, ConfigFile, ConfigProvider, ConfigResult, ConfigurationLoader,
    DiscoveryConfig, FileConfigProvider, MemoryConfigProvider, ServerConfig,
};

pub use patterns::{match_rule, match_tool, Pattern, PatternError, PatternRule, PatternSet};

pub use rules::{compile_rules, Condition, RawRule, Rule, RuleEngine, ServerFields, ToolFields};

pub use cache::{CacheStats, CachingLayer};

pub use mcp::{McpClient, McpError, McpResult, RmcpConnector, ToolConnection, ToolConnector};

pub use execution::{ConnectionError, ToolExecutionProxy};

pub use tools::{SearchEngine, ToolMetadataManager};

pub use discovery::{meta_tools, DiscoveryEngine};
