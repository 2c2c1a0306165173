//! Configuration provider trait

use async_trait::async_trait;

use super::types::ConfigFile;

/// Source of the configuration document
///
/// Implementations:
/// - `MemoryConfigProvider`: In-memory for testing and embedding
/// - `FileConfigProvider`: YAML file (~/.config/mcp-discovery/config.yaml)
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Read the current configuration
    async fn load(&self) -> ConfigResult<ConfigFile>;

    /// Replace the stored configuration
    async fn save(&self, config: &ConfigFile) -> ConfigResult<()>;
}

/// Errors that can occur while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Every violation found, not only the first
    #[error("Invalid discovery configuration ({} problems): {}", .0.len(), .0.join("; "))]
    Invalid(Vec<String>),
}

impl ConfigError {
    /// Violations carried by an `Invalid` error
    pub fn violations(&self) -> &[String] {
        match self {
            ConfigError::Invalid(errors) => errors,
            _ => &[],
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
