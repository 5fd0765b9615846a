//! Error types for docflow-link.

use thiserror::Error;

/// Result type for docflow-link operations
pub type Result<T> = std::result::Result<T, LinkError>;

/// Errors that can occur while talking to the DocFlow notification service
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    /// Network-level failure (DNS, TCP, TLS, HTTP transport)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Credential missing or rejected by the server
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// Invalid client configuration (base URL, headers, runtime)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An operation did not complete in time
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Payload could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// WebSocket upgrade or stream failure
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Malformed STOMP frame or unexpected frame sequence
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Persisted session storage failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Non-success HTTP response from the REST API
    #[error("Server error ({status_code}): {message}")]
    ServerError { status_code: u16, message: String },

    /// The client was shut down before the operation completed
    #[error("Operation cancelled")]
    Cancelled,
}

impl LinkError {
    /// Whether retrying the connection may succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            LinkError::AuthenticationError(_) | LinkError::ConfigurationError(_) | LinkError::Cancelled
        )
    }
}

impl From<serde_json::Error> for LinkError {
    fn from(err: serde_json::Error) -> Self {
        LinkError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for LinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LinkError::TimeoutError(err.to_string())
        } else if err.is_decode() {
            LinkError::SerializationError(err.to_string())
        } else {
            LinkError::NetworkError(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for LinkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        LinkError::WebSocketError(err.to_string())
    }
}
