//! Client error types
//!
//! Provides error classification for request execution with retry metadata.

use thiserror::Error;

/// Categories of client errors for retry logic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caller supplied a malformed parameter tree - non-retryable
    Contract,
    /// Connection-level faults (DNS, TLS, reset) - retryable only by policy
    Transport,
    /// Server errors (5xx) - retryable
    TransientServer,
    /// Application errors (4xx, structured error bodies) - non-retryable
    Server,
    /// Missing or unparseable response body - non-retryable
    Decode,
    /// Configuration errors - non-retryable
    Config,
}

/// Request execution errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Parameter contract violation: {0}")]
    SerializationContract(String),

    #[error("Transport fault: {0}")]
    Transport(String),

    #[error("Transient server error (HTTP {status}): {message}")]
    TransientServer { status: u16, message: String },

    #[error("Server error (HTTP {status}) {code}: {message}")]
    Server { status: u16, code: String, message: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Get the error category for this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SerializationContract(_) => ErrorCategory::Contract,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::TransientServer { .. } => ErrorCategory::TransientServer,
            Self::Server { .. } => ErrorCategory::Server,
            Self::Decode(_) => ErrorCategory::Decode,
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Whether a retry without client-side changes may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self.category(), ErrorCategory::TransientServer)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<querywire_domain::QueryWireError> for ClientError {
    fn from(err: querywire_domain::QueryWireError) -> Self {
        use querywire_domain::QueryWireError;
        match err {
            QueryWireError::Config(msg) => Self::Config(msg),
            QueryWireError::Network(msg) => Self::Transport(msg),
            QueryWireError::Auth(msg) => {
                Self::Server { status: 403, code: "AuthFailure".to_string(), message: msg }
            }
            QueryWireError::InvalidInput(msg) => Self::SerializationContract(msg),
            QueryWireError::Internal(msg) => Self::Config(msg),
        }
    }
}
