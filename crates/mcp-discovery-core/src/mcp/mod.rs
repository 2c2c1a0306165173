//! MCP (Model Context Protocol) connectivity
//!
//! The engine talks to tool servers through the [`ToolConnector`] and
//! [`ToolConnection`] traits. [`RmcpConnector`] implements them with the
//! official rmcp SDK; [`MockConnector`] implements them in-process.
//!
//! # Example
//!
//! ```rust,ignore
//! use mcp_discovery_core::mcp::{McpClient, ToolConnection};
//! use mcp_discovery_core::config::ServerConfig;
//!
//! let config = ServerConfig::stdio("npx", ["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]);
//! let client = McpClient::connect("filesystem", &config, logger).await?;
//!
//! let tools = client.list_tools().await?;
//! let output = client.call_tool("read_file", json!({ "path": "/tmp/notes.txt" })).await?;
//! client.close().await?;
//! ```

mod client;
mod connector;
mod mock;

pub use client::{McpClient, RmcpConnector};
pub use connector::{McpError, McpResult, RawTool, ToolConnection, ToolConnector, ToolOutput};
pub use mock::{MockConnector, MockMode, MockServer};
