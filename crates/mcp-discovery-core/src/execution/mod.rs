//! Tool execution against live servers

mod proxy;
mod state;

pub(crate) use proxy::check_arguments;
pub use proxy::ToolExecutionProxy;
pub use state::ConnectionError;
