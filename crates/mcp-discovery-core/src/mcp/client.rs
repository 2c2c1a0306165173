//! MCP client using the official rmcp SDK
//!
//! Connects to tool servers launched as child processes (stdio) or reached
//! over streamable HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParams, CallToolResult, ClientCapabilities, ClientInfo, Implementation, RawContent},
    service::RunningService,
    RoleClient, ServiceExt,
};
use serde_json::Value;
use tokio::sync::RwLock;

use super::connector::{McpError, McpResult, RawTool, ToolConnection, ToolConnector, ToolOutput};
use crate::config::ServerConfig;
use crate::logging::Logger;

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "mcp-discovery-core".to_string(),
            title: Some("MCP Discovery".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

/// Session with one MCP server
pub struct McpClient {
    server: String,
    /// Taken on close
    client: RwLock<Option<RunningService<RoleClient, ClientInfo>>>,
    logger: Arc<dyn Logger>,
}

impl McpClient {
    /// Connect using whichever transport `config` describes
    pub async fn connect(server: &str, config: &ServerConfig, logger: Arc<dyn Logger>) -> McpResult<Self> {
        match config.url.as_deref() {
            Some(url) if !url.trim().is_empty() => Self::connect_http(server, url, logger).await,
            _ => Self::connect_stdio(server, config, logger).await,
        }
    }

    /// Spawn the server as a child process and speak MCP over its stdio
    pub async fn connect_stdio(server: &str, config: &ServerConfig, logger: Arc<dyn Logger>) -> McpResult<Self> {
        use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};

        if config.command.trim().is_empty() {
            return Err(McpError::ConnectionFailed(format!("server '{}' has no command", server)));
        }

        logger.info(&format!(
            "[McpClient] Spawning {}: {} {}",
            server,
            config.command,
            config.args.join(" ")
        ));

        let transport = TokioChildProcess::new(tokio::process::Command::new(&config.command).configure(|cmd| {
            cmd.args(&config.args).envs(config.env.iter());
        }))
        .map_err(|e| McpError::ConnectionFailed(e.to_string()))?;

        let client = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        logger.info(&format!("[McpClient] {} connected and initialized", server));
        Ok(Self::from_service(server, client, logger))
    }

    /// Connect to an MCP server over HTTP (Streamable HTTP transport)
    pub async fn connect_http(server: &str, url: &str, logger: Arc<dyn Logger>) -> McpResult<Self> {
        use rmcp::transport::StreamableHttpClientTransport;

        logger.info(&format!("[McpClient] Connecting to {} over HTTP: {}", server, url));

        let transport = StreamableHttpClientTransport::from_uri(url);
        let client = client_info()
            .serve(transport)
            .await
            .map_err(|e| McpError::InitializationFailed(e.to_string()))?;

        logger.info(&format!("[McpClient] {} connected and initialized", server));
        Ok(Self::from_service(server, client, logger))
    }

    fn from_service(server: &str, client: RunningService<RoleClient, ClientInfo>, logger: Arc<dyn Logger>) -> Self {
        Self {
            server: server.to_string(),
            client: RwLock::new(Some(client)),
            logger,
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Name and version the server reported during initialization
    pub async fn server_info(&self) -> Option<Implementation> {
        let guard = self.client.read().await;
        guard
            .as_ref()
            .and_then(|c| c.peer_info())
            .map(|info| info.server_info.clone())
    }
}

/// Flatten a call result into JSON: structured content when the server sent
/// it, otherwise the text parts joined by newlines
fn output_from_result(result: CallToolResult) -> ToolOutput {
    let is_error = result.is_error.unwrap_or(false);

    if let Some(structured) = result.structured_content {
        return ToolOutput { content: structured, is_error };
    }

    let texts: Vec<String> = result
        .content
        .iter()
        .filter_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.clone()),
            _ => None,
        })
        .collect();

    let content = if texts.len() == result.content.len() {
        Value::String(texts.join("\n"))
    } else {
        serde_json::to_value(&result.content).unwrap_or(Value::Null)
    };

    ToolOutput { content, is_error }
}

#[async_trait]
impl ToolConnection for McpClient {
    async fn list_tools(&self) -> McpResult<Vec<RawTool>> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(McpError::Closed)?;

        let tools = client
            .list_all_tools()
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        self.logger.debug(&format!("[McpClient] {} listed {} tools", self.server, tools.len()));
        Ok(tools.into_iter().map(RawTool::from).collect())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolOutput> {
        let guard = self.client.read().await;
        let client = guard.as_ref().ok_or(McpError::Closed)?;

        self.logger.debug(&format!("[McpClient] Calling {}/{}", self.server, name));

        let params = CallToolRequestParams {
            meta: None,
            name: name.to_owned().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        };

        let result = client
            .call_tool(params)
            .await
            .map_err(|e| McpError::ToolCallFailed(e.to_string()))?;

        Ok(output_from_result(result))
    }

    async fn close(&self) -> McpResult<()> {
        let Some(client) = self.client.write().await.take() else {
            return Ok(());
        };
        self.logger.info(&format!("[McpClient] Closing connection to {}", self.server));
        client
            .cancel()
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;
        Ok(())
    }
}

/// Production connector backed by [`McpClient`]
pub struct RmcpConnector {
    logger: Arc<dyn Logger>,
}

impl RmcpConnector {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl ToolConnector for RmcpConnector {
    async fn connect(&self, server: &str, config: &ServerConfig) -> McpResult<Arc<dyn ToolConnection>> {
        let client = McpClient::connect(server, config, self.logger.clone()).await?;
        Ok(Arc::new(client))
    }
}
