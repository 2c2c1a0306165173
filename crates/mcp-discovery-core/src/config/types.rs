//! Configuration records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rules::RawRule;

fn default_true() -> bool {
    true
}

fn default_ttl() -> u64 {
    3600
}

fn default_max_concurrency() -> usize {
    8
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_list_timeout() -> u64 {
    30
}

fn default_call_timeout() -> u64 {
    60
}

/// Top-level configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Tool-server registry
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
}

impl ConfigFile {
    pub fn with_server(mut self, name: impl Into<String>, server: ServerConfig) -> Self {
        self.servers.insert(name.into(), server);
        self
    }

    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(rename = "serverRules", default)]
    pub server_rules: Vec<RawRule>,
    #[serde(rename = "toolRules", default)]
    pub tool_rules: Vec<RawRule>,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache: CacheConfig::default(),
            server_rules: Vec::new(),
            tool_rules: Vec::new(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl DiscoveryConfig {
    pub fn with_server_rules(mut self, rules: Vec<RawRule>) -> Self {
        self.server_rules = rules;
        self
    }

    pub fn with_tool_rules(mut self, rules: Vec<RawRule>) -> Self {
        self.tool_rules = rules;
        self
    }

    pub fn with_cache(mut self, enabled: bool, ttl: u64) -> Self {
        self.cache = CacheConfig { enabled, ttl };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds
    #[serde(default = "default_ttl")]
    pub ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: default_ttl(),
        }
    }
}

/// Fan-out width and upstream deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(rename = "maxConcurrency", default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(rename = "connectTimeoutSecs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(rename = "listTimeoutSecs", default = "default_list_timeout")]
    pub list_timeout_secs: u64,
    #[serde(rename = "callTimeoutSecs", default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            connect_timeout_secs: default_connect_timeout(),
            list_timeout_secs: default_list_timeout(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

/// How to reach one tool server
///
/// A server is either a child process speaking MCP over stdio (`command`)
/// or a streamable HTTP endpoint (`url`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Prepended to every tool name this server exposes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Seed tags for server rules
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            url: None,
            description: None,
            source: None,
            enabled: true,
            prefix: None,
            tags: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// A server launched as a child process
    pub fn stdio<I, S>(command: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A server reached over streamable HTTP
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Exposed name for an upstream tool name
    pub fn exposed_name(&self, upstream: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, upstream),
            None => upstream.to_string(),
        }
    }
}
