//! Per-server connection state

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use thiserror::Error;

use crate::mcp::ToolConnection;
use crate::types::{ConnectionStatus, ErrorCode};

/// Why a server could not be connected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("failed to connect to {server}: {message}")]
    Failed { server: String, message: String },

    #[error("connecting to {server} timed out after {secs}s")]
    Timeout { server: String, secs: u64 },

    #[error("connection to {server} was dropped while connecting")]
    Cancelled { server: String },
}

impl ConnectionError {
    pub fn server(&self) -> &str {
        match self {
            ConnectionError::Failed { server, .. }
            | ConnectionError::Timeout { server, .. }
            | ConnectionError::Cancelled { server } => server,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ConnectionError::Timeout { .. } => ErrorCode::Timeout,
            _ => ErrorCode::ServerNotConnected,
        }
    }
}

pub(crate) type ConnectOutcome = Result<Arc<dyn ToolConnection>, ConnectionError>;
pub(crate) type ConnectFuture = Shared<BoxFuture<'static, ConnectOutcome>>;

/// One connection attempt, shared by every caller waiting on it
#[derive(Clone)]
pub(crate) struct ConnectAttempt {
    future: ConnectFuture,
    orphan_claimed: Arc<AtomicBool>,
}

impl ConnectAttempt {
    pub(crate) fn new(future: ConnectFuture) -> Self {
        Self {
            future,
            orphan_claimed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn outcome(&self) -> ConnectFuture {
        self.future.clone()
    }

    /// True for exactly one caller. That caller closes a connection which
    /// finished opening after the attempt was superseded.
    pub(crate) fn claim_orphan(&self) -> bool {
        !self.orphan_claimed.swap(true, Ordering::AcqRel)
    }

    fn same(&self, other: &ConnectAttempt) -> bool {
        self.future.ptr_eq(&other.future)
    }
}

/// `Disconnected -> Connecting -> Connected -> Disconnected`
///
/// A connection handle only exists in `Connected`, so nothing can call a
/// server that is still connecting.
pub(crate) enum ConnectionState {
    Disconnected { last_error: Option<ConnectionError> },
    /// Every concurrent `connect` awaits this one attempt
    Connecting(ConnectAttempt),
    Connected(Arc<dyn ToolConnection>),
}

impl ConnectionState {
    pub(crate) fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Disconnected { last_error: Some(_) } => ConnectionStatus::Error,
            ConnectionState::Disconnected { last_error: None } => ConnectionStatus::Disconnected,
            ConnectionState::Connecting(_) => ConnectionStatus::Connecting,
            ConnectionState::Connected(_) => ConnectionStatus::Connected,
        }
    }

    pub(crate) fn is_attempt(&self, attempt: &ConnectAttempt) -> bool {
        matches!(self, ConnectionState::Connecting(current) if current.same(attempt))
    }
}
