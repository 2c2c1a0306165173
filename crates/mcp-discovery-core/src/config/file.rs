//! File-based configuration provider (YAML)
//!
//! Reads `~/.config/mcp-discovery/config.yaml` by default, or any explicit
//! path. A missing file is an empty configuration.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::loader::ConfigurationLoader;
use super::traits::{ConfigProvider, ConfigResult};
use super::types::ConfigFile;

/// YAML configuration file
///
/// # Example
///
/// ```no_run
/// use mcp_discovery_core::config::FileConfigProvider;
///
/// let user_config = FileConfigProvider::user();
/// let project_config = FileConfigProvider::new("/path/to/project/mcp-discovery.yaml");
/// ```
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The per-user configuration file
    pub fn user() -> Self {
        Self::new(Self::default_path())
    }

    pub fn default_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        config_dir.join("mcp-discovery").join("config.yaml")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn load(&self) -> ConfigResult<ConfigFile> {
        if !self.exists() {
            return Ok(ConfigFile::default());
        }
        let content = fs::read_to_string(&self.path)?;
        ConfigurationLoader::new().parse_yaml(&content)
    }

    async fn save(&self, config: &ConfigFile) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, ServerConfig};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_is_empty_config() {
        let dir = tempdir().unwrap();
        let provider = FileConfigProvider::new(dir.path().join("absent.yaml"));
        assert!(!provider.exists());
        assert_eq!(provider.load().await.unwrap(), ConfigFile::default());
    }

    #[tokio::test]
    async fn test_save_and_load_yaml() {
        let dir = tempdir().unwrap();
        let provider = FileConfigProvider::new(dir.path().join("nested").join("config.yaml"));

        let file = ConfigFile::default()
            .with_server("fs", ServerConfig::stdio("mcp-fs", ["/tmp"]).with_tags(&["local"]));
        provider.save(&file).await.unwrap();

        assert!(provider.exists());
        assert_eq!(provider.load().await.unwrap(), file);
    }

    #[tokio::test]
    async fn test_malformed_yaml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "servers: [not, a, map").unwrap();

        let result = FileConfigProvider::new(&path).load().await;
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_default_path() {
        assert!(FileConfigProvider::default_path().ends_with("mcp-discovery/config.yaml"));
    }
}
