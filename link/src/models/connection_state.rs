use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the notification connection.
///
/// Exactly one state is current per client. Transitions are validated by
/// [`ConnectionState::can_transition_to`]; `Disconnected` is reachable from
/// every state.
///
/// ```text
/// Disconnected --connect--> Connecting --ok--> Connected --error--> Reconnecting
///                                 \                                  |    ^
///                                  \--error--> Reconnecting <--------+    | retry failed
///                                                  |  \--retry ok--> Connected
///                                                  \--exhausted--> Failed --connect--> Connecting
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Automatic retries exhausted; only a manual `connect()` recovers.
    Failed,
}

impl ConnectionState {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (_, Disconnected) => true,
            (Disconnected, Connecting) | (Failed, Connecting) => true,
            (Connecting, Connected) | (Connecting, Reconnecting) | (Connecting, Failed) => true,
            (Connected, Reconnecting) => true,
            (Reconnecting, Connected) | (Reconnecting, Reconnecting) | (Reconnecting, Failed) => {
                true
            },
            _ => false,
        }
    }

    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    /// True while a connect attempt is in flight or scheduled.
    pub fn is_pending(self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Reconnecting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
