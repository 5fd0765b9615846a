//! Error types for docflow-cli
//!
//! Provides user-friendly error messages for common CLI failures.

use docflow_link::LinkError;
use std::fmt;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CLIError>;

/// Errors that can occur in the CLI
#[derive(Debug)]
pub enum CLIError {
    /// Error from docflow-link
    LinkError(LinkError),

    /// Configuration file error
    ConfigurationError(String),

    /// File I/O error
    FileError(String),

    /// Invalid command-line input
    ParseError(String),

    /// User cancelled operation
    Cancelled,
}

impl CLIError {
    fn format_link_error(err: &LinkError) -> String {
        match err {
            LinkError::NetworkError(msg) => Self::clean_nested_message(msg),
            LinkError::AuthenticationError(msg) => format!("Not authorized: {}", msg),
            LinkError::ConfigurationError(msg)
            | LinkError::TimeoutError(msg)
            | LinkError::SerializationError(msg)
            | LinkError::WebSocketError(msg)
            | LinkError::ProtocolError(msg)
            | LinkError::StorageError(msg) => msg.clone(),
            LinkError::ServerError {
                status_code,
                message,
            } => format!("Server error ({}): {}", status_code, message),
            LinkError::Cancelled => "Operation cancelled".to_string(),
        }
    }

    fn clean_nested_message(message: &str) -> String {
        let mut cleaned = message.trim();
        let prefixes = ["Connection failed:", "Network error:", "error sending request:"];

        loop {
            let mut stripped = false;
            for prefix in &prefixes {
                if let Some(rest) = cleaned.strip_prefix(prefix) {
                    cleaned = rest.trim_start();
                    stripped = true;
                    break;
                }
            }
            if !stripped {
                break;
            }
        }

        cleaned.to_string()
    }
}

impl fmt::Display for CLIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CLIError::LinkError(e) => write!(f, "{}", Self::format_link_error(e)),
            CLIError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CLIError::FileError(msg) => write!(f, "File error: {}", msg),
            CLIError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            CLIError::Cancelled => write!(f, "Operation cancelled"),
        }
    }
}

impl std::error::Error for CLIError {}

impl From<LinkError> for CLIError {
    fn from(err: LinkError) -> Self {
        CLIError::LinkError(err)
    }
}

impl From<std::io::Error> for CLIError {
    fn from(err: std::io::Error) -> Self {
        CLIError::FileError(err.to_string())
    }
}

impl From<toml::de::Error> for CLIError {
    fn from(err: toml::de::Error) -> Self {
        CLIError::ConfigurationError(format!("TOML parse error: {}", err))
    }
}

impl From<serde_json::Error> for CLIError {
    fn from(err: serde_json::Error) -> Self {
        CLIError::ParseError(format!("Invalid JSON: {}", err))
    }
}
