//! Defaults, merging and validation
//!
//! Validation compiles every rule up front. A configuration with any
//! problem is rejected whole, with all problems listed.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;

use super::traits::{ConfigError, ConfigResult};
use super::types::{ConfigFile, DiscoveryConfig, ServerConfig};
use crate::rules::{compile_rules, RuleEngine, ServerFields, ToolFields};

/// Upstream deadlines and fan-out width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSettings {
    pub max_concurrency: usize,
    pub connect_timeout: Duration,
    pub list_timeout: Duration,
    pub call_timeout: Duration,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            connect_timeout: Duration::from_secs(30),
            list_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// A validated configuration with its rule sets compiled
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub enabled: bool,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub execution: ExecutionSettings,
    pub server_rules: RuleEngine<ServerFields>,
    pub tool_rules: RuleEngine<ToolFields>,
    pub servers: BTreeMap<String, ServerConfig>,
}

impl Default for CompiledConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(3600),
            execution: ExecutionSettings::default(),
            server_rules: RuleEngine::default(),
            tool_rules: RuleEngine::default(),
            servers: BTreeMap::new(),
        }
    }
}

/// Builds and validates discovery configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigurationLoader;

impl ConfigurationLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn default_config(&self) -> DiscoveryConfig {
        DiscoveryConfig::default()
    }

    /// Fill every field absent from `partial` with its default
    pub fn merge_with_defaults(&self, partial: Value) -> ConfigResult<DiscoveryConfig> {
        if partial.is_null() {
            return Ok(self.default_config());
        }
        Ok(serde_json::from_value(partial)?)
    }

    pub fn parse_yaml(&self, content: &str) -> ConfigResult<ConfigFile> {
        if content.trim().is_empty() {
            return Ok(ConfigFile::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Check `file` and compile its rule sets
    pub fn compile(&self, file: &ConfigFile) -> ConfigResult<CompiledConfig> {
        let discovery = &file.discovery;
        let mut errors = Vec::new();

        if discovery.cache.ttl == 0 {
            errors.push("cache.ttl must be a positive number of seconds".to_string());
        }
        let execution = &discovery.execution;
        if execution.max_concurrency == 0 {
            errors.push("execution.maxConcurrency must be at least 1".to_string());
        }
        for (name, secs) in [
            ("connectTimeoutSecs", execution.connect_timeout_secs),
            ("listTimeoutSecs", execution.list_timeout_secs),
            ("callTimeoutSecs", execution.call_timeout_secs),
        ] {
            if secs == 0 {
                errors.push(format!("execution.{} must be a positive number of seconds", name));
            }
        }

        for (name, server) in &file.servers {
            validate_server(name, server, &mut errors);
        }

        let server_rules = compile_rules::<ServerFields>("serverRules", &discovery.server_rules, &mut errors);
        let tool_rules = compile_rules::<ToolFields>("toolRules", &discovery.tool_rules, &mut errors);

        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        Ok(CompiledConfig {
            enabled: discovery.enabled,
            cache_enabled: discovery.cache.enabled,
            cache_ttl: Duration::from_secs(discovery.cache.ttl),
            execution: ExecutionSettings {
                max_concurrency: execution.max_concurrency,
                connect_timeout: Duration::from_secs(execution.connect_timeout_secs),
                list_timeout: Duration::from_secs(execution.list_timeout_secs),
                call_timeout: Duration::from_secs(execution.call_timeout_secs),
            },
            server_rules,
            tool_rules,
            servers: file.servers.clone(),
        })
    }
}

fn validate_server(name: &str, server: &ServerConfig, errors: &mut Vec<String>) {
    if name.trim().is_empty() {
        errors.push("servers: server names must not be empty".to_string());
    }
    let has_command = !server.command.trim().is_empty();
    let has_url = server.url.as_deref().is_some_and(|u| !u.trim().is_empty());
    match (has_command, has_url) {
        (false, false) => errors.push(format!("servers.{}: either command or url is required", name)),
        (true, true) => errors.push(format!("servers.{}: command and url are mutually exclusive", name)),
        _ => {}
    }
}
