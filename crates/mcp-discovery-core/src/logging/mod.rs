//! Logging abstractions for runtime-agnostic logging

mod console;
mod file_logger;
mod noop;
mod traits;

pub use console::ConsoleLogger;
pub use file_logger::{FileLogger, LogLevel, LOG_FILE_ENV, LOG_LEVEL_ENV};
pub use noop::NoOpLogger;
pub use traits::Logger;

use std::sync::Arc;

/// File logger if `MCP_DISCOVERY_LOG_FILE` is set, console logger otherwise
pub fn default_logger() -> Arc<dyn Logger> {
    match FileLogger::from_env() {
        Some(file) => Arc::new(file),
        None => Arc::new(ConsoleLogger::new()),
    }
}
