//! Connection lifecycle and tool invocation
//!
//! The proxy owns one [`ConnectionState`] per server. Concurrent connects
//! to the same server share a single attempt; different servers connect
//! independently. Every upstream call runs under a deadline and every
//! failure comes back as a value.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::state::{ConnectAttempt, ConnectionError, ConnectionState};
use crate::config::{ExecutionSettings, ServerConfig};
use crate::logging::Logger;
use crate::mcp::{RawTool, ToolConnection, ToolConnector};
use crate::types::{ConnectionStatus, ErrorCode, ExecutionResult, ServerError};

pub struct ToolExecutionProxy {
    connector: Arc<dyn ToolConnector>,
    states: Mutex<HashMap<String, ConnectionState>>,
    settings: RwLock<ExecutionSettings>,
    logger: Arc<dyn Logger>,
}

impl ToolExecutionProxy {
    pub fn new(connector: Arc<dyn ToolConnector>, settings: ExecutionSettings, logger: Arc<dyn Logger>) -> Self {
        Self {
            connector,
            states: Mutex::new(HashMap::new()),
            settings: RwLock::new(settings),
            logger,
        }
    }

    /// Deadlines for calls started from now on
    pub fn set_settings(&self, settings: ExecutionSettings) {
        *self.settings.write() = settings;
    }

    pub fn settings(&self) -> ExecutionSettings {
        *self.settings.read()
    }

    /// Connect to `server`, or join the attempt already under way.
    /// Returns immediately when already connected.
    pub async fn connect(&self, server: &str, config: &ServerConfig) -> Result<(), ConnectionError> {
        let attempt = {
            let mut states = self.states.lock();
            match states.get(server) {
                Some(ConnectionState::Connected(_)) => return Ok(()),
                Some(ConnectionState::Connecting(attempt)) => attempt.clone(),
                _ => {
                    let attempt = self.start_attempt(server, config);
                    states.insert(server.to_string(), ConnectionState::Connecting(attempt.clone()));
                    attempt
                }
            }
        };

        let outcome = attempt.outcome().await;

        // `Some` when a disconnect superseded the attempt after it opened a
        // connection. Only the waiter that claims it gets the handle to close.
        let superseded = {
            let mut states = self.states.lock();
            let ours = states.get(server).is_some_and(|s| s.is_attempt(&attempt));

            match &outcome {
                _ if ours => {
                    let next = match &outcome {
                        Ok(connection) => ConnectionState::Connected(connection.clone()),
                        Err(e) => ConnectionState::Disconnected { last_error: Some(e.clone()) },
                    };
                    states.insert(server.to_string(), next);
                    None
                }
                Ok(connection) => {
                    let promoted = matches!(
                        states.get(server),
                        Some(ConnectionState::Connected(current)) if Arc::ptr_eq(connection, current)
                    );
                    (!promoted).then(|| attempt.claim_orphan().then(|| connection.clone()))
                }
                Err(_) => None,
            }
        };

        if let Some(orphan) = superseded {
            if let Some(orphan) = orphan {
                self.logger.debug(&format!(
                    "[ToolExecutionProxy] Closing connection to {} opened after disconnect",
                    server
                ));
                if let Err(e) = orphan.close().await {
                    self.logger.warn(&format!("[ToolExecutionProxy] Closing {} failed: {}", server, e));
                }
            }
            return Err(ConnectionError::Cancelled { server: server.to_string() });
        }

        match outcome {
            Ok(_) => {
                self.logger.info(&format!("[ToolExecutionProxy] Connected to {}", server));
                Ok(())
            }
            Err(e) => {
                self.logger.warn(&format!("[ToolExecutionProxy] {}", e));
                Err(e)
            }
        }
    }

    fn start_attempt(&self, server: &str, config: &ServerConfig) -> ConnectAttempt {
        let connector = self.connector.clone();
        let server = server.to_string();
        let config = config.clone();
        let timeout = self.settings().connect_timeout;

        self.logger.debug(&format!("[ToolExecutionProxy] Connecting to {}", server));

        let future = async move {
            match tokio::time::timeout(timeout, connector.connect(&server, &config)).await {
                Ok(Ok(connection)) => Ok(connection),
                Ok(Err(e)) => Err(ConnectionError::Failed {
                    server,
                    message: e.to_string(),
                }),
                Err(_) => Err(ConnectionError::Timeout {
                    server,
                    secs: timeout.as_secs(),
                }),
            }
        }
        .boxed()
        .shared();

        ConnectAttempt::new(future)
    }

    fn connection(&self, server: &str) -> Option<Arc<dyn ToolConnection>> {
        match self.states.lock().get(server) {
            Some(ConnectionState::Connected(connection)) => Some(connection.clone()),
            _ => None,
        }
    }

    pub fn is_connected(&self, server: &str) -> bool {
        self.connection(server).is_some()
    }

    pub fn status(&self, server: &str) -> ConnectionStatus {
        self.states
            .lock()
            .get(server)
            .map(ConnectionState::status)
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    pub fn last_error(&self, server: &str) -> Option<ConnectionError> {
        match self.states.lock().get(server) {
            Some(ConnectionState::Disconnected { last_error }) => last_error.clone(),
            _ => None,
        }
    }

    /// Every server this proxy has seen, in name order
    pub fn servers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.states.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Enumerate the tools of a connected server
    pub async fn list_tools(&self, server: &str) -> Result<Vec<RawTool>, ServerError> {
        let connection = self.connection(server).ok_or_else(|| {
            ServerError::new(server, ErrorCode::ServerNotConnected, format!("server {} is not connected", server))
        })?;
        let timeout = self.settings().list_timeout;

        match tokio::time::timeout(timeout, connection.list_tools()).await {
            Ok(Ok(tools)) => {
                self.logger.debug(&format!("[ToolExecutionProxy] {} listed {} tools", server, tools.len()));
                Ok(tools)
            }
            Ok(Err(e)) => Err(ServerError::new(server, ErrorCode::ExecutionFailed, e.to_string())),
            Err(_) => {
                self.logger.warn(&format!(
                    "[ToolExecutionProxy] Listing tools on {} timed out after {}s",
                    server,
                    timeout.as_secs()
                ));
                Err(ServerError::new(
                    server,
                    ErrorCode::Timeout,
                    format!("listing tools timed out after {}s", timeout.as_secs()),
                ))
            }
        }
    }

    /// Invoke `tool` on `server`. Never fails; errors are in the result.
    pub async fn execute(&self, server: &str, tool: &str, args: Option<Value>) -> ExecutionResult {
        let arguments = match check_arguments(args) {
            Ok(arguments) => arguments,
            Err(message) => return ExecutionResult::failure(ErrorCode::InvalidArguments, server, tool, message),
        };

        let Some(connection) = self.connection(server) else {
            return ExecutionResult::failure(
                ErrorCode::ServerNotConnected,
                server,
                tool,
                format!("server {} is not connected", server),
            );
        };

        let timeout = self.settings().call_timeout;
        self.logger.info(&format!("[ToolExecutionProxy] Executing {}/{}", server, tool));

        match tokio::time::timeout(timeout, connection.call_tool(tool, arguments)).await {
            Ok(Ok(output)) if output.is_error => {
                ExecutionResult::failure(ErrorCode::ExecutionFailed, server, tool, output.error_message())
            }
            Ok(Ok(output)) => ExecutionResult::success(output.content),
            Ok(Err(e)) => {
                self.logger.warn(&format!("[ToolExecutionProxy] {}/{} failed: {}", server, tool, e));
                ExecutionResult::failure(ErrorCode::ExecutionFailed, server, tool, e.to_string())
            }
            Err(_) => {
                self.logger.warn(&format!(
                    "[ToolExecutionProxy] {}/{} timed out after {}s",
                    server,
                    tool,
                    timeout.as_secs()
                ));
                ExecutionResult::failure(
                    ErrorCode::Timeout,
                    server,
                    tool,
                    format!("call timed out after {}s", timeout.as_secs()),
                )
            }
        }
    }

    /// Drop the connection to `server`. Succeeds whatever the state,
    /// including for servers never connected.
    pub async fn disconnect(&self, server: &str) {
        let previous = self
            .states
            .lock()
            .insert(server.to_string(), ConnectionState::Disconnected { last_error: None });

        if let Some(ConnectionState::Connected(connection)) = previous {
            self.logger.info(&format!("[ToolExecutionProxy] Disconnecting from {}", server));
            if let Err(e) = connection.close().await {
                self.logger.warn(&format!("[ToolExecutionProxy] Closing {} failed: {}", server, e));
            }
        }
    }

    pub async fn disconnect_all(&self) {
        for server in self.servers() {
            self.disconnect(&server).await;
        }
    }
}

/// Tool arguments must be present and a JSON object
pub(crate) fn check_arguments(args: Option<Value>) -> Result<Value, &'static str> {
    match args {
        None | Some(Value::Null) => Err("arguments are required"),
        Some(Value::Object(map)) => Ok(Value::Object(map)),
        Some(_) => Err("arguments must be a JSON object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::mcp::{MockConnector, MockMode, MockServer};
    use serde_json::json;
    use std::time::Duration;

    fn proxy_with(connector: &Arc<MockConnector>, settings: ExecutionSettings) -> ToolExecutionProxy {
        ToolExecutionProxy::new(connector.clone(), settings, Arc::new(NoOpLogger::new()))
    }

    fn config() -> ServerConfig {
        ServerConfig::stdio("mock", Vec::<String>::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_connects_share_one_attempt() {
        let connector = Arc::new(
            MockConnector::new().with_server("svc", MockServer::new(&["t"]).connect_delay(Duration::from_secs(1))),
        );
        let proxy = proxy_with(&connector, ExecutionSettings::default());
        let cfg = config();

        let (a, b) = tokio::join!(proxy.connect("svc", &cfg), proxy.connect("svc", &cfg));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(connector.connect_count("svc"), 1);
        assert!(proxy.is_connected("svc"));

        proxy.connect("svc", &cfg).await.unwrap();
        assert_eq!(connector.connect_count("svc"), 1);
    }

    #[tokio::test]
    async fn test_failed_connect_is_recorded_and_retried() {
        let connector = Arc::new(MockConnector::new().with_server("down", MockServer::new(&[]).fail_connect("refused")));
        let proxy = proxy_with(&connector, ExecutionSettings::default());

        let err = proxy.connect("down", &config()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Failed { .. }));
        assert_eq!(proxy.status("down"), ConnectionStatus::Error);
        assert!(proxy.last_error("down").is_some());

        assert!(proxy.connect("down", &config()).await.is_err());
        assert_eq!(connector.connect_count("down"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let connector = Arc::new(
            MockConnector::new().with_server("slow", MockServer::new(&[]).connect_delay(Duration::from_secs(60))),
        );
        let settings = ExecutionSettings {
            connect_timeout: Duration::from_secs(5),
            ..ExecutionSettings::default()
        };
        let proxy = proxy_with(&connector, settings);

        let err = proxy.connect("slow", &config()).await.unwrap_err();
        assert_eq!(err, ConnectionError::Timeout { server: "slow".into(), secs: 5 });
        assert_eq!(err.code(), ErrorCode::Timeout);
        assert!(!proxy.is_connected("slow"));
    }

    #[tokio::test]
    async fn test_execute_validates_before_dispatch() {
        let connector = Arc::new(MockConnector::new().with_server("svc", MockServer::new(&["tool"])));
        let proxy = proxy_with(&connector, ExecutionSettings::default());

        let missing = proxy.execute("svc", "tool", None).await;
        assert_eq!(missing.code(), Some(ErrorCode::InvalidArguments));
        let scalar = proxy.execute("svc", "tool", Some(json!("x"))).await;
        assert_eq!(scalar.code(), Some(ErrorCode::InvalidArguments));

        let offline = proxy.execute("svc", "tool", Some(json!({}))).await;
        assert_eq!(offline.code(), Some(ErrorCode::ServerNotConnected));
        let error = offline.error.unwrap();
        assert_eq!((error.server.as_str(), error.tool.as_str()), ("svc", "tool"));

        assert!(connector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_execute_success_and_failures() {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("echo", MockServer::new(&["ping"]))
                .with_server("broken", MockServer::new(&["t"]).with_mode(MockMode::Error("pipe closed".into())))
                .with_server("refuses", MockServer::new(&["t"]).with_mode(MockMode::ToolError("denied".into()))),
        );
        let proxy = proxy_with(&connector, ExecutionSettings::default());
        for server in ["echo", "broken", "refuses"] {
            proxy.connect(server, &config()).await.unwrap();
        }

        let ok = proxy.execute("echo", "ping", Some(json!({ "n": 1 }))).await;
        assert!(ok.success);
        assert_eq!(ok.result, Some(json!({ "tool": "ping", "arguments": { "n": 1 } })));

        let transport = proxy.execute("broken", "t", Some(json!({}))).await;
        assert_eq!(transport.code(), Some(ErrorCode::ExecutionFailed));
        assert!(transport.error.unwrap().message.contains("pipe closed"));

        let reported = proxy.execute("refuses", "t", Some(json!({}))).await;
        assert_eq!(reported.code(), Some(ErrorCode::ExecutionFailed));
        assert_eq!(reported.error.unwrap().message, "denied");
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_timeout() {
        let connector = Arc::new(
            MockConnector::new().with_server("slow", MockServer::new(&["t"]).call_delay(Duration::from_secs(120))),
        );
        let settings = ExecutionSettings {
            call_timeout: Duration::from_secs(10),
            ..ExecutionSettings::default()
        };
        let proxy = proxy_with(&connector, settings);
        proxy.connect("slow", &config()).await.unwrap();

        let result = proxy.execute("slow", "t", Some(json!({}))).await;
        assert_eq!(result.code(), Some(ErrorCode::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_tools_timeout_and_not_connected() {
        let connector = Arc::new(
            MockConnector::new().with_server("slow", MockServer::new(&["t"]).list_delay(Duration::from_secs(120))),
        );
        let proxy = proxy_with(&connector, ExecutionSettings::default());

        let err = proxy.list_tools("slow").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ServerNotConnected);

        proxy.connect("slow", &config()).await.unwrap();
        let err = proxy.list_tools("slow").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Timeout);
    }

    #[tokio::test]
    async fn test_disconnect_always_succeeds() {
        let connector = Arc::new(MockConnector::new().with_server("svc", MockServer::new(&["t"])));
        let proxy = proxy_with(&connector, ExecutionSettings::default());

        proxy.disconnect("never-seen").await;
        assert_eq!(proxy.status("never-seen"), ConnectionStatus::Disconnected);

        proxy.connect("svc", &config()).await.unwrap();
        proxy.disconnect("svc").await;
        proxy.disconnect("svc").await;
        assert!(!proxy.is_connected("svc"));
        assert_eq!(connector.close_count(), 1);

        let result = proxy.execute("svc", "t", Some(json!({}))).await;
        assert_eq!(result.code(), Some(ErrorCode::ServerNotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_while_connecting_closes_late_connection() {
        let connector = Arc::new(
            MockConnector::new().with_server("svc", MockServer::new(&["t"]).connect_delay(Duration::from_secs(2))),
        );
        let proxy = Arc::new(proxy_with(&connector, ExecutionSettings::default()));

        let pending = {
            let proxy = proxy.clone();
            tokio::spawn(async move { proxy.connect("svc", &config()).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(proxy.status("svc"), ConnectionStatus::Connecting);

        proxy.disconnect("svc").await;
        let outcome = pending.await.unwrap();

        assert!(matches!(outcome, Err(ConnectionError::Cancelled { .. })));
        assert!(!proxy.is_connected("svc"));
        assert_eq!(connector.close_count(), 1);
    }

    #[derive(Default)]
    struct Warnings {
        lines: parking_lot::Mutex<Vec<String>>,
    }

    impl Logger for Warnings {
        fn debug(&self, _message: &str) {}
        fn info(&self, _message: &str) {}
        fn warn(&self, message: &str) {
            self.lines.lock().push(message.to_string());
        }
        fn error(&self, _message: &str) {}
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_connection_closed_once_for_all_waiters() {
        let connector = Arc::new(MockConnector::new().with_server(
            "svc",
            MockServer::new(&["t"])
                .connect_delay(Duration::from_secs(2))
                .fail_close("pipe already gone"),
        ));
        let warnings = Arc::new(Warnings::default());
        let proxy = Arc::new(ToolExecutionProxy::new(
            connector.clone(),
            ExecutionSettings::default(),
            warnings.clone(),
        ));

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let proxy = proxy.clone();
                tokio::spawn(async move { proxy.connect("svc", &config()).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_secs(1)).await;
        proxy.disconnect("svc").await;

        for waiter in waiters {
            let outcome = waiter.await.unwrap();
            assert!(matches!(outcome, Err(ConnectionError::Cancelled { .. })), "{:?}", outcome);
        }
        assert_eq!(connector.connect_count("svc"), 1);
        assert_eq!(connector.close_calls(), 1);
        assert!(!proxy.is_connected("svc"));

        let lines = warnings.lines.lock();
        assert_eq!(lines.len(), 1, "{:?}", *lines);
        assert!(lines[0].contains("Closing svc failed"));
        assert!(lines[0].contains("pipe already gone"));
    }

    #[tokio::test]
    async fn test_disconnect_all() {
        let connector = Arc::new(
            MockConnector::new()
                .with_server("a", MockServer::new(&["t"]))
                .with_server("b", MockServer::new(&["t"])),
        );
        let proxy = proxy_with(&connector, ExecutionSettings::default());
        proxy.connect("a", &config()).await.unwrap();
        proxy.connect("b", &config()).await.unwrap();
        assert_eq!(proxy.servers(), vec!["a", "b"]);

        proxy.disconnect_all().await;
        assert!(!proxy.is_connected("a") && !proxy.is_connected("b"));
        assert_eq!(connector.close_count(), 2);
    }
}
