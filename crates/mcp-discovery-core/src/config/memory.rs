//! In-memory configuration provider

use async_trait::async_trait;
use parking_lot::RwLock;

use super::traits::{ConfigProvider, ConfigResult};
use super::types::{ConfigFile, ServerConfig};

/// In-memory configuration provider for testing and embedding
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    config: RwLock<ConfigFile>,
}

impl MemoryConfigProvider {
    pub fn new(config: ConfigFile) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the configuration (picked up on the next reload)
    pub fn set(&self, config: ConfigFile) {
        *self.config.write() = config;
    }

    /// Insert or replace one server definition
    pub fn upsert_server(&self, name: impl Into<String>, server: ServerConfig) {
        self.config.write().servers.insert(name.into(), server);
    }

    pub fn remove_server(&self, name: &str) -> bool {
        self.config.write().servers.remove(name).is_some()
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    async fn load(&self) -> ConfigResult<ConfigFile> {
        Ok(self.config.read().clone())
    }

    async fn save(&self, config: &ConfigFile) -> ConfigResult<()> {
        self.set(config.clone());
        Ok(())
    }
}
