//! Store error types.
//!
//! Only construction and topology resolution surface these to callers directly.
//! Regular reads and writes go through [`StoreClient`](crate::StoreClient), which
//! logs them and degrades to an absent value.

use std::fmt;

/// Errors raised by a key-value backend or by topology resolution.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The node could not be reached (socket, pool or I/O failure).
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection failure.
        message: String,
    },

    /// The engine answered with an error reply (wrong type, no such key, ...).
    #[error("Response error: {message}")]
    Response {
        /// The engine's error reply.
        message: String,
    },

    /// The replication topology could not be determined.
    #[error("Topology error: {message}")]
    Topology {
        /// Description of the topology problem.
        message: String,
    },

    /// The node is administratively unavailable.
    #[error("Store unavailable: {node}")]
    Unavailable {
        /// Node identifier.
        node: String,
    },
}

impl StoreError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Response` error.
    #[must_use]
    pub fn response(message: impl Into<String>) -> Self {
        Self::Response {
            message: message.into(),
        }
    }

    /// Creates a new `Topology` error.
    #[must_use]
    pub fn topology(message: impl Into<String>) -> Self {
        Self::Topology {
            message: message.into(),
        }
    }

    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(node: impl Into<String>) -> Self {
        Self::Unavailable { node: node.into() }
    }

    /// Returns `true` for an engine-level error reply.
    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response { .. })
    }

    /// Returns `true` when the node itself could not be reached.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Unavailable { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } | Self::Unavailable { .. } => ErrorCategory::Infrastructure,
            Self::Response { .. } => ErrorCategory::Engine,
            Self::Topology { .. } => ErrorCategory::Topology,
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::ResponseError
            | redis::ErrorKind::TypeError
            | redis::ErrorKind::ExtensionError => Self::response(err.to_string()),
            _ => Self::connection(err.to_string()),
        }
    }
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        match err {
            deadpool_redis::PoolError::Backend(e) => e.into(),
            other => Self::connection(other.to_string()),
        }
    }
}

impl From<deadpool_redis::CreatePoolError> for StoreError {
    fn from(err: deadpool_redis::CreatePoolError) -> Self {
        Self::connection(err.to_string())
    }
}

/// Categories of store errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Node unreachable.
    Infrastructure,
    /// Error reply from the engine.
    Engine,
    /// Master/replica resolution failed.
    Topology,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Engine => write!(f, "engine"),
            Self::Topology => write!(f, "topology"),
        }
    }
}

/// Type alias for a store result.
pub type StoreResult<T> = Result<T, StoreError>;
