//! The discovery engine
//!
//! Composes the catalog cache, the metadata manager, the execution proxy
//! and the search engine behind one API. Catalog reads go through the
//! cache; execution goes straight to the proxy.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;

use crate::cache::{CacheStats, CachingLayer};
use crate::config::{CompiledConfig, ConfigFile, ConfigProvider, ConfigResult, ConfigurationLoader, ServerConfig};
use crate::execution::{check_arguments, ToolExecutionProxy};
use crate::logging::Logger;
use crate::mcp::ToolConnector;
use crate::tools::{filter_enabled, find_tool, tokenize, SearchEngine, ToolMetadataManager};
use crate::types::{
    ErrorCode, ExecutionResult, PartialResult, SearchOptions, SearchResult, ServerError, ServerMetadata,
    ToolMetadata,
};

type Catalog = Arc<Vec<ToolMetadata>>;

fn catalog_key(server: &str) -> String {
    format!("tools:{}", server)
}

/// Entry point for agents and CLIs
///
/// Call [`DiscoveryEngine::dispose`] on shutdown so every server
/// connection is closed.
///
/// ```rust,ignore
/// let engine = DiscoveryEngine::from_config(&file, Arc::new(RmcpConnector::new(logger.clone())), logger)?;
///
/// let hits = engine.search_tools("create issue", &SearchOptions::new().with_limit(5)).await;
/// let result = engine.execute_tool("github", "create_issue", Some(json!({ "title": "Bug" }))).await;
///
/// engine.dispose().await;
/// ```
pub struct DiscoveryEngine {
    config: RwLock<Arc<CompiledConfig>>,
    provider: Option<Arc<dyn ConfigProvider>>,
    loader: ConfigurationLoader,
    cache: CachingLayer<Catalog, ServerError>,
    metadata: Arc<ToolMetadataManager>,
    proxy: Arc<ToolExecutionProxy>,
    search: SearchEngine,
    logger: Arc<dyn Logger>,
}

impl DiscoveryEngine {
    pub fn new(config: CompiledConfig, connector: Arc<dyn ToolConnector>, logger: Arc<dyn Logger>) -> Self {
        logger.info(&format!(
            "[DiscoveryEngine] {} servers registered, {} server rules, {} tool rules",
            config.servers.len(),
            config.server_rules.len(),
            config.tool_rules.len()
        ));

        Self {
            cache: CachingLayer::new(config.cache_enabled),
            metadata: Arc::new(ToolMetadataManager::new(logger.clone())),
            proxy: Arc::new(ToolExecutionProxy::new(connector, config.execution, logger.clone())),
            config: RwLock::new(Arc::new(config)),
            provider: None,
            loader: ConfigurationLoader::new(),
            search: SearchEngine::new(),
            logger,
        }
    }

    /// Validate `file` and build an engine over it
    pub fn from_config(file: &ConfigFile, connector: Arc<dyn ToolConnector>, logger: Arc<dyn Logger>) -> ConfigResult<Self> {
        let compiled = ConfigurationLoader::new().compile(file)?;
        Ok(Self::new(compiled, connector, logger))
    }

    /// Load configuration from `provider` and keep it for [`reload`](Self::reload)
    pub async fn from_provider(
        provider: Arc<dyn ConfigProvider>,
        connector: Arc<dyn ToolConnector>,
        logger: Arc<dyn Logger>,
    ) -> ConfigResult<Self> {
        let file = provider.load().await?;
        Ok(Self::from_config(&file, connector, logger)?.with_provider(provider))
    }

    pub fn with_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// The configuration currently in force
    pub fn config(&self) -> Arc<CompiledConfig> {
        self.config.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.config.read().enabled
    }

    pub fn proxy(&self) -> &ToolExecutionProxy {
        &self.proxy
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn disabled_error(server: &str) -> ServerError {
        ServerError::new(server, ErrorCode::DiscoveryDisabled, "tool discovery is disabled")
    }

    fn unregistered_error(server: &str) -> ServerError {
        ServerError::new(server, ErrorCode::ServerNotConnected, format!("server {} is not registered", server))
    }

    /// The catalog of one server, from cache or freshly enumerated
    async fn catalog(&self, server: &str) -> Result<Catalog, ServerError> {
        let config = self.config();
        let server_config = config
            .servers
            .get(server)
            .cloned()
            .ok_or_else(|| Self::unregistered_error(server))?;

        let proxy = self.proxy.clone();
        let metadata = self.metadata.clone();
        let name = server.to_string();
        let ttl = config.cache_ttl;

        self.cache
            .get_or_compute(&catalog_key(server), ttl, move || async move {
                load_catalog(&name, &server_config, &config, &proxy, &metadata).await
            })
            .await
    }

    /// Fetch several catalogs concurrently, at most `maxConcurrency` at once
    async fn catalogs(&self, servers: Vec<String>) -> PartialResult<Catalog> {
        let width = self.config().execution.max_concurrency.max(1);

        let outcomes: Vec<Result<Catalog, ServerError>> = stream::iter(servers)
            .map(|server| async move { self.catalog(&server).await })
            .buffer_unordered(width)
            .collect()
            .await;

        let mut result = PartialResult::default();
        for outcome in outcomes {
            match outcome {
                Ok(catalog) => result.items.push(catalog),
                Err(e) => {
                    self.logger.warn(&format!("[DiscoveryEngine] {}", e));
                    result.errors.push(e);
                }
            }
        }
        result.errors.sort_by(|a, b| a.server.cmp(&b.server));
        result
    }

    /// Registered servers in name order, with rule-derived state and tool
    /// counts. Disabled servers are reported but not contacted.
    pub async fn list_servers(&self) -> PartialResult<ServerMetadata> {
        let config = self.config();
        if !config.enabled {
            return PartialResult::default();
        }

        let resolved: Vec<_> = config
            .servers
            .iter()
            .map(|(name, server)| {
                let fields = ToolMetadataManager::resolve_server(name, server, &config.server_rules);
                (name, server, fields)
            })
            .collect();

        let to_load = resolved
            .iter()
            .filter(|(_, _, fields)| fields.enabled)
            .map(|(name, _, _)| name.to_string())
            .collect();
        let loaded = self.catalogs(to_load).await;

        let items = resolved
            .into_iter()
            .map(|(name, server, fields)| {
                let error = loaded
                    .errors
                    .iter()
                    .find(|e| &e.server == name)
                    .map(|e| e.message.clone())
                    .or_else(|| self.proxy.last_error(name).map(|e| e.to_string()));

                ServerMetadata {
                    name: name.clone(),
                    description: server.description.clone(),
                    source: server.source.clone(),
                    enabled: fields.enabled,
                    tags: fields.tags,
                    tool_count: self.metadata.tool_count(name),
                    enabled_count: self.metadata.enabled_count(name),
                    status: self.proxy.status(name),
                    error,
                }
            })
            .collect();

        PartialResult {
            items,
            errors: loaded.errors,
        }
    }

    /// Rank tools across servers against `query`
    ///
    /// Only enabled servers are searched unless `include_disabled` is set
    /// or the search is restricted to one server.
    pub async fn search_tools(&self, query: &str, options: &SearchOptions) -> PartialResult<SearchResult> {
        let config = self.config();
        if !config.enabled || tokenize(query).is_empty() {
            return PartialResult::default();
        }

        let servers: Vec<String> = match &options.server {
            Some(server) => vec![server.clone()],
            None => config
                .servers
                .iter()
                .filter(|(name, server)| {
                    options.include_disabled
                        || ToolMetadataManager::resolve_server(name, server, &config.server_rules).enabled
                })
                .map(|(name, _)| name.clone())
                .collect(),
        };

        let loaded = self.catalogs(servers).await;
        let items = self
            .search
            .search(query, loaded.items.iter().flat_map(|c| c.iter()), options);

        self.logger.debug(&format!(
            "[DiscoveryEngine] search '{}' matched {} tools",
            query,
            items.len()
        ));

        PartialResult {
            items,
            errors: loaded.errors,
        }
    }

    /// Tools of one server; disabled tools only when asked for
    pub async fn list_tools(&self, server: &str, include_disabled: bool) -> Result<Vec<ToolMetadata>, ServerError> {
        if !self.is_enabled() {
            return Err(Self::disabled_error(server));
        }
        let catalog = self.catalog(server).await?;
        Ok(filter_enabled(&catalog, include_disabled))
    }

    /// One tool by exposed or upstream name, `None` if the server has no
    /// such tool
    pub async fn get_tool_details(&self, server: &str, tool: &str) -> Result<Option<ToolMetadata>, ServerError> {
        if !self.is_enabled() {
            return Err(Self::disabled_error(server));
        }
        let catalog = self.catalog(server).await?;
        Ok(find_tool(&catalog, tool).cloned())
    }

    /// Run `tool` on `server`. Never fails; errors are in the result.
    ///
    /// Checks run in order: arguments, registration, catalog (which
    /// connects), tool existence, tool enabled. A call that times out
    /// drops the server's connection so the next call reconnects.
    pub async fn execute_tool(&self, server: &str, tool: &str, args: Option<Value>) -> ExecutionResult {
        if !self.is_enabled() {
            return ExecutionResult::failure(ErrorCode::DiscoveryDisabled, server, tool, "tool discovery is disabled");
        }

        let arguments = match check_arguments(args) {
            Ok(arguments) => arguments,
            Err(message) => return ExecutionResult::failure(ErrorCode::InvalidArguments, server, tool, message),
        };

        let config = self.config();
        let Some(server_config) = config.servers.get(server) else {
            return ExecutionResult::failure(
                ErrorCode::ServerNotConnected,
                server,
                tool,
                format!("server {} is not registered", server),
            );
        };

        let catalog = match self.catalog(server).await {
            Ok(catalog) => catalog,
            Err(e) => return ExecutionResult::failure(e.code, server, tool, e.message),
        };

        let Some(metadata) = find_tool(&catalog, tool) else {
            return ExecutionResult::failure(
                ErrorCode::ToolNotFound,
                server,
                tool,
                format!("server {} has no tool named {}", server, tool),
            );
        };
        if !metadata.enabled {
            return ExecutionResult::failure(
                ErrorCode::ToolDisabled,
                server,
                tool,
                format!("tool {} on {} is disabled", tool, server),
            );
        }

        // A cached catalog can outlive its connection
        if let Err(e) = self.proxy.connect(server, server_config).await {
            return ExecutionResult::failure(e.code(), server, tool, e.to_string());
        }

        let mut result = self
            .proxy
            .execute(server, &metadata.upstream_name, Some(arguments))
            .await;

        if result.code() == Some(ErrorCode::Timeout) {
            self.logger.warn(&format!(
                "[DiscoveryEngine] Dropping connection to {} after a timed out call",
                server
            ));
            self.proxy.disconnect(server).await;
        }
        if let Some(error) = result.error.as_mut() {
            error.tool = tool.to_string();
        }
        result
    }

    /// Re-read configuration (when a provider is set), recompile rules and
    /// drop every cached catalog. Live connections stay open except to
    /// servers no longer registered. An invalid configuration leaves the
    /// current one in force.
    pub async fn reload(&self) -> ConfigResult<()> {
        let next = match &self.provider {
            Some(provider) => {
                let file = provider.load().await?;
                match self.loader.compile(&file) {
                    Ok(compiled) => Arc::new(compiled),
                    Err(e) => {
                        self.logger.error(&format!("[DiscoveryEngine] Reload rejected: {}", e));
                        return Err(e);
                    }
                }
            }
            None => self.config(),
        };

        let previous = std::mem::replace(&mut *self.config.write(), next.clone());

        self.proxy.set_settings(next.execution);
        self.cache.set_enabled(next.cache_enabled);
        self.cache.invalidate_all();
        self.metadata.clear();

        for server in previous.servers.keys().filter(|s| !next.servers.contains_key(*s)) {
            self.logger.info(&format!("[DiscoveryEngine] {} is no longer registered", server));
            self.proxy.disconnect(server).await;
        }

        self.logger.info("[DiscoveryEngine] Configuration reloaded");
        Ok(())
    }

    /// Disconnect from every server and drop all cached state
    pub async fn dispose(&self) {
        self.proxy.disconnect_all().await;
        self.cache.invalidate_all();
        self.metadata.clear();
        self.logger.info("[DiscoveryEngine] Disposed");
    }
}

/// Connect, enumerate and apply rules. Runs as the cache producer.
async fn load_catalog(
    server: &str,
    server_config: &ServerConfig,
    config: &CompiledConfig,
    proxy: &ToolExecutionProxy,
    metadata: &ToolMetadataManager,
) -> Result<Catalog, ServerError> {
    proxy
        .connect(server, server_config)
        .await
        .map_err(|e| ServerError::new(server, e.code(), e.to_string()))?;

    let raw_tools = match proxy.list_tools(server).await {
        Ok(tools) => tools,
        Err(e) => {
            if e.code == ErrorCode::Timeout {
                proxy.disconnect(server).await;
            }
            return Err(e);
        }
    };

    Ok(metadata.refresh(server, server_config, raw_tools, &config.server_rules, &config.tool_rules))
}
