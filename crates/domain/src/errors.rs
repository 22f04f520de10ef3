//! Error types used throughout the client

use thiserror::Error;

/// Main error type for querywire
#[derive(Error, Debug)]
pub enum QueryWireError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for querywire operations
pub type Result<T> = std::result::Result<T, QueryWireError>;
