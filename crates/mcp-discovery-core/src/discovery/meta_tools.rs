//! Agent-facing meta-tools
//!
//! An agent sees these six tools instead of every upstream tool. It
//! searches or browses the catalog, reads one tool's schema, then calls it
//! through `execute_tool`.

use serde::Deserialize;
use serde_json::{json, Value};

use super::engine::DiscoveryEngine;
use crate::types::{ErrorCode, SearchOptions, ServerError, Tool};

pub const LIST_MCP_SERVERS: &str = "list_mcp_servers";
pub const SEARCH_TOOLS: &str = "search_tools";
pub const LIST_TOOLS: &str = "list_tools";
pub const GET_TOOL_DETAILS: &str = "get_tool_details";
pub const EXECUTE_TOOL: &str = "execute_tool";
pub const REFRESH_CACHE: &str = "refresh_cache";

/// Definitions of every meta-tool, ready to advertise to an agent
pub fn meta_tools() -> Vec<Tool> {
    vec![
        Tool::new(
            LIST_MCP_SERVERS,
            "List the registered tool servers with their status, tags and tool counts",
        ),
        Tool::new(
            SEARCH_TOOLS,
            "Search every server for tools relevant to a task. Returns the best matches first.",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "What you want to do, in a few words" },
                "server": { "type": "string", "description": "Only search this server" },
                "limit": { "type": "integer", "minimum": 1, "description": "Maximum results (default 10)" },
                "includeDisabled": { "type": "boolean", "description": "Also return disabled tools" },
                "includeSchema": { "type": "boolean", "description": "Attach each tool's input schema" }
            },
            "required": ["query"]
        })),
        Tool::new(LIST_TOOLS, "List the tools of one server").with_schema(json!({
            "type": "object",
            "properties": {
                "server": { "type": "string" },
                "includeDisabled": { "type": "boolean" }
            },
            "required": ["server"]
        })),
        Tool::new(
            GET_TOOL_DETAILS,
            "Full description, parameters and input schema of one tool",
        )
        .with_schema(json!({
            "type": "object",
            "properties": {
                "server": { "type": "string" },
                "tool": { "type": "string" }
            },
            "required": ["server", "tool"]
        })),
        Tool::new(EXECUTE_TOOL, "Call a tool on a server").with_schema(json!({
            "type": "object",
            "properties": {
                "server": { "type": "string" },
                "tool": { "type": "string" },
                "arguments": { "type": "object", "description": "Arguments matching the tool's input schema" }
            },
            "required": ["server", "tool", "arguments"]
        })),
        Tool::new(
            REFRESH_CACHE,
            "Reload configuration and forget cached tool catalogs",
        ),
    ]
}

pub fn is_meta_tool(name: &str) -> bool {
    matches!(
        name,
        LIST_MCP_SERVERS | SEARCH_TOOLS | LIST_TOOLS | GET_TOOL_DETAILS | EXECUTE_TOOL | REFRESH_CACHE
    )
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(flatten)]
    options: SearchOptions,
}

#[derive(Deserialize)]
struct ListArgs {
    server: String,
    #[serde(rename = "includeDisabled", default)]
    include_disabled: bool,
}

#[derive(Deserialize)]
struct DetailArgs {
    server: String,
    tool: String,
}

#[derive(Deserialize)]
struct ExecuteArgs {
    server: String,
    tool: String,
    #[serde(default)]
    arguments: Option<Value>,
}

fn error_value(code: ErrorCode, message: impl Into<String>) -> Value {
    json!({ "error": { "code": code, "message": message.into() } })
}

fn server_error_value(error: &ServerError) -> Value {
    json!({ "error": { "code": error.code, "message": error.message, "server": error.server } })
}

fn parse<T: for<'de> Deserialize<'de>>(tool: &str, args: Value) -> Result<T, Value> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args)
        .map_err(|e| error_value(ErrorCode::InvalidArguments, format!("{}: {}", tool, e)))
}

impl DiscoveryEngine {
    /// Run a meta-tool call and render its JSON response. Failures come
    /// back as `{ "error": { "code", "message" } }`.
    pub async fn handle_meta_tool(&self, name: &str, args: Value) -> Value {
        match self.dispatch_meta_tool(name, args).await {
            Ok(value) | Err(value) => value,
        }
    }

    async fn dispatch_meta_tool(&self, name: &str, args: Value) -> Result<Value, Value> {
        match name {
            LIST_MCP_SERVERS => {
                let servers = self.list_servers().await;
                Ok(json!({ "servers": servers.items, "errors": servers.errors }))
            }
            SEARCH_TOOLS => {
                let SearchArgs { query, options } = parse(name, args)?;
                let found = self.search_tools(&query, &options).await;
                Ok(json!({ "results": found.items, "errors": found.errors }))
            }
            LIST_TOOLS => {
                let ListArgs { server, include_disabled } = parse(name, args)?;
                let tools = self
                    .list_tools(&server, include_disabled)
                    .await
                    .map_err(|e| server_error_value(&e))?;
                Ok(json!({ "server": server, "tools": tools }))
            }
            GET_TOOL_DETAILS => {
                let DetailArgs { server, tool } = parse(name, args)?;
                match self.get_tool_details(&server, &tool).await {
                    Ok(Some(details)) => Ok(json!(details)),
                    Ok(None) => Err(server_error_value(&ServerError::new(
                        server.as_str(),
                        ErrorCode::ToolNotFound,
                        format!("server {} has no tool named {}", server, tool),
                    ))),
                    Err(e) => Err(server_error_value(&e)),
                }
            }
            EXECUTE_TOOL => {
                let ExecuteArgs { server, tool, arguments } = parse(name, args)?;
                Ok(json!(self.execute_tool(&server, &tool, arguments).await))
            }
            REFRESH_CACHE => match self.reload().await {
                Ok(()) => Ok(json!({ "success": true })),
                Err(e) => Ok(json!({
                    "success": false,
                    "message": e.to_string(),
                    "problems": e.violations(),
                })),
            },
            other => Err(error_value(ErrorCode::ToolNotFound, format!("unknown meta-tool {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigFile, ServerConfig};
    use crate::logging::NoOpLogger;
    use crate::mcp::{MockConnector, MockServer};
    use std::sync::Arc;

    fn engine() -> DiscoveryEngine {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("github", MockServer::new(&["create_issue", "get_issue"]))
                .with_server("jira", MockServer::new(&["create_ticket"])),
        );
        let file = ConfigFile::default()
            .with_server("github", ServerConfig::stdio("gh", Vec::<String>::new()))
            .with_server("jira", ServerConfig::stdio("jira", Vec::<String>::new()));
        DiscoveryEngine::from_config(&file, connector, Arc::new(NoOpLogger::new())).unwrap()
    }

    #[test]
    fn test_definitions() {
        let tools = meta_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![LIST_MCP_SERVERS, SEARCH_TOOLS, LIST_TOOLS, GET_TOOL_DETAILS, EXECUTE_TOOL, REFRESH_CACHE]
        );
        assert!(names.iter().all(|n| is_meta_tool(n)));
        assert!(!is_meta_tool("create_issue"));

        let execute = tools.iter().find(|t| t.name == EXECUTE_TOOL).unwrap();
        assert_eq!(execute.input_schema["required"], json!(["server", "tool", "arguments"]));
    }

    #[tokio::test]
    async fn test_search_and_list() {
        let engine = engine();

        let found = engine
            .handle_meta_tool(SEARCH_TOOLS, json!({ "query": "create", "limit": 1, "includeSchema": true }))
            .await;
        let results = found["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["tool"], "create_issue");
        assert!(results[0].get("inputSchema").is_some());

        let listed = engine.handle_meta_tool(LIST_TOOLS, json!({ "server": "jira" })).await;
        assert_eq!(listed["tools"][0]["name"], "create_ticket");

        let servers = engine.handle_meta_tool(LIST_MCP_SERVERS, Value::Null).await;
        assert_eq!(servers["servers"].as_array().unwrap().len(), 2);
        assert_eq!(servers["servers"][0]["toolCount"], 2);
    }

    #[tokio::test]
    async fn test_details_and_execute() {
        let engine = engine();

        let details = engine
            .handle_meta_tool(GET_TOOL_DETAILS, json!({ "server": "github", "tool": "get_issue" }))
            .await;
        assert_eq!(details["upstreamName"], "get_issue");

        let missing = engine
            .handle_meta_tool(GET_TOOL_DETAILS, json!({ "server": "github", "tool": "nope" }))
            .await;
        assert_eq!(missing["error"]["code"], "TOOL_NOT_FOUND");

        let executed = engine
            .handle_meta_tool(
                EXECUTE_TOOL,
                json!({ "server": "github", "tool": "create_issue", "arguments": { "title": "x" } }),
            )
            .await;
        assert_eq!(executed["success"], true);
        assert_eq!(executed["result"]["arguments"]["title"], "x");

        let no_args = engine
            .handle_meta_tool(EXECUTE_TOOL, json!({ "server": "github", "tool": "create_issue" }))
            .await;
        assert_eq!(no_args["error"]["code"], "INVALID_ARGUMENTS");
    }

    #[tokio::test]
    async fn test_bad_calls() {
        let engine = engine();

        let missing_query = engine.handle_meta_tool(SEARCH_TOOLS, json!({})).await;
        assert_eq!(missing_query["error"]["code"], "INVALID_ARGUMENTS");

        let unknown = engine.handle_meta_tool("launch_rockets", json!({})).await;
        assert_eq!(unknown["error"]["code"], "TOOL_NOT_FOUND");

        let unregistered = engine.handle_meta_tool(LIST_TOOLS, json!({ "server": "nowhere" })).await;
        assert_eq!(unregistered["error"]["code"], "SERVER_NOT_CONNECTED");
        assert_eq!(unregistered["error"]["server"], "nowhere");

        let refreshed = engine.handle_meta_tool(REFRESH_CACHE, Value::Null).await;
        assert_eq!(refreshed["success"], true);
    }
}
