//! Configuration file management
//!
//! Loads `~/.docflow/config.toml`; a missing file means defaults.
//!
//! # Configuration Format
//!
//! ```toml
//! [server]
//! url = "https://api.docflow.edu"   # API origin; the socket lives at {url}/ws
//!
//! [connection]
//! auto_reconnect = true             # Retry after the connection drops
//! reconnect_delay_ms = 1000         # First retry delay, doubled per attempt
//! max_reconnect_delay_ms = 30000    # Upper bound for a single delay
//! max_reconnect_attempts = 5        # Retries before giving up (0 = unlimited)
//! heartbeat_ms = 4000               # STOMP heartbeat in both directions
//!
//! [ui]
//! color = true
//! ```

use docflow_link::ConnectionOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CLIError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "~/.docflow/config.toml";

/// CLI configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CLIConfiguration {
    /// Server connection settings
    pub server: Option<ServerConfig>,

    /// Connection/reconnection settings
    pub connection: Option<ConnectionConfig>,

    /// UI preferences
    pub ui: Option<UIConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// API origin (e.g., https://api.docflow.edu)
    #[serde(default = "default_url")]
    pub url: String,
}

/// Connection settings for reconnection behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Maximum number of reconnection attempts (0 = unlimited, default: 5)
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UIConfig {
    /// Enable colored output
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_heartbeat_ms() -> u64 {
    4000
}

fn default_color() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { url: default_url() }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: default_auto_reconnect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_ms: default_heartbeat_ms(),
        }
    }
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
        }
    }
}

pub fn expand_config_path(path: &Path) -> PathBuf {
    let path_str = path.to_str().unwrap_or(DEFAULT_CONFIG_PATH);
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    }
    path.to_path_buf()
}

pub fn default_config_path() -> PathBuf {
    expand_config_path(Path::new(DEFAULT_CONFIG_PATH))
}

impl CLIConfiguration {
    /// Load configuration from file
    ///
    /// Returns default configuration if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        let path = expand_config_path(path);
        if !path.exists() {
            tracing::debug!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            CLIError::ConfigurationError(format!("Failed to read config file: {}", e))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let path = expand_config_path(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CLIError::ConfigurationError(format!("Failed to serialize: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Build ConnectionOptions from the `[connection]` table
    pub fn to_connection_options(&self) -> ConnectionOptions {
        let conn = self.resolved_connection();
        let max_attempts = if conn.max_reconnect_attempts == 0 {
            None
        } else {
            Some(conn.max_reconnect_attempts)
        };
        ConnectionOptions::default()
            .with_auto_reconnect(conn.auto_reconnect)
            .with_reconnect_delay_ms(conn.reconnect_delay_ms)
            .with_max_reconnect_delay_ms(conn.max_reconnect_delay_ms)
            .with_max_reconnect_attempts(max_attempts)
            .with_heartbeat_ms(conn.heartbeat_ms, conn.heartbeat_ms)
    }

    /// `--url` wins over the config file.
    pub fn server_url(&self, override_url: Option<&str>) -> String {
        match override_url {
            Some(url) => url.to_string(),
            None => self.resolved_server().url,
        }
    }

    pub fn resolved_server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn resolved_connection(&self) -> ConnectionConfig {
        self.connection.clone().unwrap_or_default()
    }

    pub fn resolved_ui(&self) -> UIConfig {
        self.ui.clone().unwrap_or_default()
    }
}
