//! Connection lifecycle and notification hooks.
//!
//! The presentation surface (badges, toasts, connectivity indicator) observes
//! the client through these callbacks:
//!
//! - [`on_connect`](EventHandlers::on_connect): every successful connect
//! - [`on_reconnect`](EventHandlers::on_reconnect): once per recovery after failed attempts
//! - [`on_disconnect`](EventHandlers::on_disconnect): an established session was lost or closed
//! - [`on_error`](EventHandlers::on_error): connection errors; `recoverable == false` is terminal
//! - [`on_state_change`](EventHandlers::on_state_change): every [`ConnectionState`] transition
//! - [`on_notification`](EventHandlers::on_notification): a notification was pushed to the user
//!
//! # Example
//!
//! ```rust
//! use docflow_link::EventHandlers;
//!
//! let handlers = EventHandlers::new()
//!     .on_reconnect(|| println!("Connection restored"))
//!     .on_error(|err| {
//!         if !err.recoverable {
//!             eprintln!("{}", err);
//!         }
//!     })
//!     .on_notification(|n| println!("{}: {}", n.title, n.message));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::models::{ConnectionState, Notification};

/// Reason for a disconnect event.
#[derive(Debug, Clone)]
pub struct DisconnectReason {
    /// Human-readable description of why the session ended.
    pub message: String,
    /// WebSocket close code, if the server sent one.
    pub code: Option<u16>,
}

impl DisconnectReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code: {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Error information passed to the `on_error` handler.
#[derive(Debug, Clone)]
pub struct ConnectionError {
    /// Human-readable error message.
    pub message: String,
    /// `false` once automatic reconnection has given up.
    pub recoverable: bool,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub type OnConnectCallback = Arc<dyn Fn() + Send + Sync>;
pub type OnReconnectCallback = Arc<dyn Fn() + Send + Sync>;
pub type OnDisconnectCallback = Arc<dyn Fn(DisconnectReason) + Send + Sync>;
pub type OnErrorCallback = Arc<dyn Fn(ConnectionError) + Send + Sync>;
pub type OnStateChangeCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;
pub type OnNotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Client lifecycle and notification hooks.
///
/// All handlers are optional. They run on the client's connection task, so
/// they should return quickly.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_connect: Option<OnConnectCallback>,
    pub(crate) on_reconnect: Option<OnReconnectCallback>,
    pub(crate) on_disconnect: Option<OnDisconnectCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
    pub(crate) on_state_change: Option<OnStateChangeCallback>,
    pub(crate) on_notification: Option<OnNotificationCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_reconnect", &self.on_reconnect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_state_change", &self.on_state_change.is_some())
            .field("on_notification", &self.on_notification.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// Create an empty set of handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every successful STOMP handshake.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Called once when a connection succeeds after one or more failed
    /// attempts. This is the "reconnected" toast.
    pub fn on_reconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reconnect = Some(Arc::new(f));
        self
    }

    /// Called when an established session ends (server close, heartbeat
    /// loss, stream error or explicit disconnect).
    pub fn on_disconnect(mut self, f: impl Fn(DisconnectReason) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Called on connection errors. A non-recoverable error means automatic
    /// reconnection stopped and the user has to reconnect manually.
    pub fn on_error(mut self, f: impl Fn(ConnectionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called on every connection state transition.
    pub fn on_state_change(mut self, f: impl Fn(ConnectionState) + Send + Sync + 'static) -> Self {
        self.on_state_change = Some(Arc::new(f));
        self
    }

    /// Called for every notification pushed on the user's notification stream.
    pub fn on_notification(mut self, f: impl Fn(&Notification) + Send + Sync + 'static) -> Self {
        self.on_notification = Some(Arc::new(f));
        self
    }

    /// Returns `true` if any handler is registered.
    pub fn has_any(&self) -> bool {
        self.on_connect.is_some()
            || self.on_reconnect.is_some()
            || self.on_disconnect.is_some()
            || self.on_error.is_some()
            || self.on_state_change.is_some()
            || self.on_notification.is_some()
    }

    pub(crate) fn emit_connect(&self) {
        if let Some(cb) = &self.on_connect {
            cb();
        }
    }

    pub(crate) fn emit_reconnect(&self) {
        if let Some(cb) = &self.on_reconnect {
            cb();
        }
    }

    pub(crate) fn emit_disconnect(&self, reason: DisconnectReason) {
        if let Some(cb) = &self.on_disconnect {
            cb(reason);
        }
    }

    pub(crate) fn emit_error(&self, error: ConnectionError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn emit_state_change(&self, state: ConnectionState) {
        if let Some(cb) = &self.on_state_change {
            cb(state);
        }
    }

    pub(crate) fn emit_notification(&self, notification: &Notification) {
        if let Some(cb) = &self.on_notification {
            cb(notification);
        }
    }
}
