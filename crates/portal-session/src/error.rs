//! Session error types.

use portal_store::StoreError;

/// Errors raised by session operations.
///
/// - `NotFound`: the subject is anonymous; restart the flow.
/// - `WriteFailure`: the mutation may not have taken effect; retryable upstream.
/// - `Connection`: the store was unreachable at construction time.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Session absent, expired, or invalid.
    #[error("{kind} session not found: {key}")]
    NotFound {
        /// Session kind ("app", "portal", ...).
        kind: &'static str,
        /// Session key.
        key: String,
    },

    /// A commit, TTL extension or field write did not succeed.
    #[error("Unable to write {operation} for session {key}")]
    WriteFailure {
        /// The operation that failed.
        operation: &'static str,
        /// Session key.
        key: String,
    },

    /// A field the operation depends on is absent from the session.
    #[error("Session {key} has no field '{field}'")]
    MissingField {
        /// Session key.
        key: String,
        /// The missing field.
        field: String,
    },

    /// The store could not be reached.
    #[error(transparent)]
    Connection(#[from] StoreError),

    /// A JSON blob stored in the session could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The credential-encryption service refused the request.
    #[error("Credential error: {0}")]
    Credential(String),
}

impl SessionError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }

    /// Creates a new `WriteFailure` error.
    #[must_use]
    pub fn write_failure(operation: &'static str, key: impl Into<String>) -> Self {
        Self::WriteFailure {
            operation,
            key: key.into(),
        }
    }

    /// Creates a new `MissingField` error.
    #[must_use]
    pub fn missing_field(key: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            key: key.into(),
            field: field.into(),
        }
    }

    /// Returns `true` if the caller should treat the subject as anonymous.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if a write may not have taken effect.
    #[must_use]
    pub fn is_write_failure(&self) -> bool {
        matches!(self, Self::WriteFailure { .. })
    }
}

/// Type alias for a session result.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SessionError::not_found("app", "abc");
        assert_eq!(err.to_string(), "app session not found: abc");

        let err = SessionError::write_failure("register_sso", "k1");
        assert_eq!(err.to_string(), "Unable to write register_sso for session k1");

        let err = SessionError::missing_field("k1", "backend_42");
        assert_eq!(err.to_string(), "Session k1 has no field 'backend_42'");
    }

    #[test]
    fn test_error_predicates() {
        assert!(SessionError::not_found("portal", "k").is_not_found());
        assert!(!SessionError::not_found("portal", "k").is_write_failure());
        assert!(SessionError::write_failure("commit", "k").is_write_failure());
        assert!(SessionError::from(StoreError::connection("down")).to_string().contains("down"));
    }
}
