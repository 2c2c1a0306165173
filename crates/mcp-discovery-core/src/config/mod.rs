//! Discovery configuration
//!
//! - `ConfigFile`: the document (discovery settings + server registry)
//! - `ConfigurationLoader`: defaults, merging, validation and rule compilation
//! - `MemoryConfigProvider` / `FileConfigProvider`: where the document lives

mod file;
mod loader;
mod memory;
mod traits;
mod types;

pub use file::FileConfigProvider;
pub use loader::{CompiledConfig, ConfigurationLoader, ExecutionSettings};
pub use memory::MemoryConfigProvider;
pub use traits::{ConfigError, ConfigProvider, ConfigResult};
pub use types::{CacheConfig, ConfigFile, DiscoveryConfig, ExecutionConfig, ServerConfig};
