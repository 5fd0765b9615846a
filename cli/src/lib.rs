//! Library entry point for docflow-cli components.
//!
//! Exposes the configuration, session storage, logging and terminal
//! rendering pieces so tests can use them without going through the binary
//! entry point.

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod surface;

pub use config::CLIConfiguration;
pub use error::{CLIError, Result};
pub use storage::FileStorage;
