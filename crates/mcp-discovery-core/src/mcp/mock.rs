//! Mock connector for testing

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};

use super::connector::{McpError, McpResult, RawTool, ToolConnection, ToolConnector, ToolOutput};
use crate::config::ServerConfig;

/// How a mock server answers tool calls
#[derive(Debug, Clone)]
pub enum MockMode {
    /// `{ "tool": name, "arguments": args }`
    Echo,
    /// Always this value
    Fixed(Value),
    /// Transport-level failure
    Error(String),
    /// The tool reports failure in its result
    ToolError(String),
}

/// Behaviour of one mock server
#[derive(Debug, Clone)]
pub struct MockServer {
    tools: Vec<RawTool>,
    mode: MockMode,
    connect_error: Option<String>,
    list_error: Option<String>,
    close_error: Option<String>,
    connect_delay: Duration,
    list_delay: Duration,
    call_delay: Duration,
}

impl MockServer {
    /// A server exposing tools with these names
    pub fn new(tools: &[&str]) -> Self {
        Self::with_tools(
            tools
                .iter()
                .map(|name| RawTool::new(*name).with_description(format!("Mock tool {}", name)))
                .collect(),
        )
    }

    pub fn with_tools(tools: Vec<RawTool>) -> Self {
        Self {
            tools,
            mode: MockMode::Echo,
            connect_error: None,
            list_error: None,
            close_error: None,
            connect_delay: Duration::ZERO,
            list_delay: Duration::ZERO,
            call_delay: Duration::ZERO,
        }
    }

    pub fn with_mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn fail_connect(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    pub fn fail_list(mut self, message: impl Into<String>) -> Self {
        self.list_error = Some(message.into());
        self
    }

    /// Closing still marks the connection closed, then reports `message`
    pub fn fail_close(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }

    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = delay;
        self
    }

    pub fn call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }
}

#[derive(Default)]
struct Counters {
    connects: Mutex<HashMap<String, usize>>,
    lists: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<(String, String, Value)>>,
    closes: AtomicUsize,
    close_calls: AtomicUsize,
}

/// In-process stand-in for a set of tool servers
///
/// Connection attempts, catalog listings, calls and closes are counted so
/// tests can assert how much upstream work happened.
#[derive(Default)]
pub struct MockConnector {
    servers: RwLock<HashMap<String, MockServer>>,
    counters: Arc<Counters>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(self, name: impl Into<String>, server: MockServer) -> Self {
        self.set_server(name, server);
        self
    }

    /// Replace a server's behaviour. Affects connections opened afterwards.
    pub fn set_server(&self, name: impl Into<String>, server: MockServer) {
        self.servers.write().insert(name.into(), server);
    }

    pub fn connect_count(&self, server: &str) -> usize {
        self.counters.connects.lock().get(server).copied().unwrap_or(0)
    }

    pub fn list_count(&self, server: &str) -> usize {
        self.counters.lists.lock().get(server).copied().unwrap_or(0)
    }

    pub fn close_count(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }

    /// Every `close` call, including repeats on an already closed connection
    pub fn close_calls(&self) -> usize {
        self.counters.close_calls.load(Ordering::SeqCst)
    }

    /// Every call made so far, as `(server, tool, arguments)`
    pub fn calls(&self) -> Vec<(String, String, Value)> {
        self.counters.calls.lock().clone()
    }
}

#[async_trait]
impl ToolConnector for MockConnector {
    async fn connect(&self, server: &str, _config: &ServerConfig) -> McpResult<Arc<dyn ToolConnection>> {
        *self.counters.connects.lock().entry(server.to_string()).or_insert(0) += 1;

        let spec = self
            .servers
            .read()
            .get(server)
            .cloned()
            .ok_or_else(|| McpError::ConnectionFailed(format!("no mock server named '{}'", server)))?;

        if !spec.connect_delay.is_zero() {
            tokio::time::sleep(spec.connect_delay).await;
        }
        if let Some(message) = &spec.connect_error {
            return Err(McpError::ConnectionFailed(message.clone()));
        }

        Ok(Arc::new(MockConnection {
            server: server.to_string(),
            spec,
            closed: AtomicBool::new(false),
            counters: self.counters.clone(),
        }))
    }
}

struct MockConnection {
    server: String,
    spec: MockServer,
    closed: AtomicBool,
    counters: Arc<Counters>,
}

#[async_trait]
impl ToolConnection for MockConnection {
    async fn list_tools(&self) -> McpResult<Vec<RawTool>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Closed);
        }
        *self.counters.lists.lock().entry(self.server.clone()).or_insert(0) += 1;

        if !self.spec.list_delay.is_zero() {
            tokio::time::sleep(self.spec.list_delay).await;
        }
        match &self.spec.list_error {
            Some(message) => Err(McpError::Protocol(message.clone())),
            None => Ok(self.spec.tools.clone()),
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<ToolOutput> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Closed);
        }
        self.counters
            .calls
            .lock()
            .push((self.server.clone(), name.to_string(), arguments.clone()));

        if !self.spec.call_delay.is_zero() {
            tokio::time::sleep(self.spec.call_delay).await;
        }
        if !self.spec.tools.iter().any(|t| t.name == name) {
            return Err(McpError::ToolCallFailed(format!("unknown tool '{}'", name)));
        }

        match &self.spec.mode {
            MockMode::Echo => Ok(ToolOutput::ok(json!({ "tool": name, "arguments": arguments }))),
            MockMode::Fixed(value) => Ok(ToolOutput::ok(value.clone())),
            MockMode::Error(message) => Err(McpError::ToolCallFailed(message.clone())),
            MockMode::ToolError(message) => Ok(ToolOutput::error(Value::String(message.clone()))),
        }
    }

    async fn close(&self) -> McpResult<()> {
        self.counters.close_calls.fetch_add(1, Ordering::SeqCst);
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
        match &self.spec.close_error {
            Some(message) => Err(McpError::Protocol(message.clone())),
            None => Ok(()),
        }
    }
}
