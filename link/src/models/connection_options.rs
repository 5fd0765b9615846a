use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection-level options for the notification client.
///
/// Controls the reconnect backoff, the STOMP heartbeat request and the
/// endpoint paths. Timeouts live in [`LinkTimeouts`](crate::LinkTimeouts).
///
/// # Example
///
/// ```rust
/// use docflow_link::ConnectionOptions;
///
/// let options = ConnectionOptions::default()
///     .with_reconnect_delay_ms(500)
///     .with_max_reconnect_attempts(Some(10))
///     .with_heartbeat_ms(10_000, 10_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Enable automatic reconnection after transport errors.
    /// Default: true
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Base delay for the exponential backoff, in milliseconds.
    /// Attempt `n` (0-based) waits `reconnect_delay_ms * 2^n`.
    /// Default: 1000
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Upper bound for a single backoff delay, in milliseconds.
    /// Default: 30000
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Maximum number of automatic reconnection attempts before the client
    /// enters the `Failed` state. `None` retries forever, `Some(0)` never retries.
    /// Default: Some(5)
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: Option<u32>,

    /// Outgoing heartbeat interval requested in the STOMP CONNECT frame.
    /// `0` disables outgoing heartbeats. Default: 4000
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_outgoing_ms: u64,

    /// Incoming heartbeat interval requested in the STOMP CONNECT frame.
    /// `0` disables inbound liveness checking. Default: 4000
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_incoming_ms: u64,

    /// WebSocket endpoint path on the API origin.
    /// Default: "/ws"
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Path tried when the upgrade on `ws_path` is rejected.
    /// Default: "/ws/websocket" (the raw WebSocket leg of a SockJS endpoint)
    #[serde(default = "default_fallback_ws_path")]
    pub fallback_ws_path: Option<String>,
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

fn default_max_reconnect_attempts() -> Option<u32> {
    Some(5)
}

fn default_heartbeat_ms() -> u64 {
    4000
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_fallback_ws_path() -> Option<String> {
    Some("/ws/websocket".to_string())
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: default_auto_reconnect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            heartbeat_outgoing_ms: default_heartbeat_ms(),
            heartbeat_incoming_ms: default_heartbeat_ms(),
            ws_path: default_ws_path(),
            fallback_ws_path: default_fallback_ws_path(),
        }
    }
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    pub fn with_max_reconnect_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    /// Pass `None` for infinite retries, `Some(0)` to disable reconnection.
    pub fn with_max_reconnect_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    /// Set the requested outgoing / incoming heartbeat intervals.
    pub fn with_heartbeat_ms(mut self, outgoing_ms: u64, incoming_ms: u64) -> Self {
        self.heartbeat_outgoing_ms = outgoing_ms;
        self.heartbeat_incoming_ms = incoming_ms;
        self
    }

    pub fn with_ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    pub fn with_fallback_ws_path(mut self, path: Option<String>) -> Self {
        self.fallback_ws_path = path;
        self
    }

    /// Backoff delay before retry number `attempt` (0-based):
    /// `min(reconnect_delay_ms * 2^attempt, max_reconnect_delay_ms)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = std::cmp::min(
            self.reconnect_delay_ms
                .saturating_mul(2u64.saturating_pow(attempt)),
            self.max_reconnect_delay_ms,
        );
        Duration::from_millis(delay)
    }

    /// Whether another automatic retry is allowed after `attempts` retries.
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.auto_reconnect && self.max_reconnect_attempts.map_or(true, |max| attempts < max)
    }
}
