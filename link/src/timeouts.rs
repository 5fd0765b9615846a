//! Timeout configuration for docflow-link operations.
//!
//! Centralizes the time budgets for establishing the WebSocket, completing
//! the STOMP handshake and pushing frames onto the socket.

use std::time::Duration;

/// Timeout configuration for docflow-link operations.
///
/// # Examples
///
/// ```rust
/// use docflow_link::LinkTimeouts;
/// use std::time::Duration;
///
/// // Use defaults (recommended for most cases)
/// let timeouts = LinkTimeouts::default();
///
/// // Custom timeouts for high-latency environments
/// let timeouts = LinkTimeouts::builder()
///     .connection_timeout(Duration::from_secs(60))
///     .auth_timeout(Duration::from_secs(20))
///     .build();
///
/// // Aggressive timeouts for local development
/// let timeouts = LinkTimeouts::fast();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTimeouts {
    /// Timeout for opening the socket (TCP + TLS + HTTP upgrade).
    /// Default: 10 seconds
    pub connection_timeout: Duration,

    /// Timeout for the STOMP CONNECT / CONNECTED exchange.
    /// Default: 5 seconds
    pub auth_timeout: Duration,

    /// Timeout for writing a single frame to the socket.
    /// Default: 10 seconds
    pub send_timeout: Duration,

    /// Timeout for REST calls made by [`NotificationApi`](crate::NotificationApi).
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl Default for LinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl LinkTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> LinkTimeoutsBuilder {
        LinkTimeoutsBuilder::new()
    }

    /// Shorter timeouts suitable for localhost servers.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            auth_timeout: Duration::from_secs(2),
            send_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }

    /// Longer timeouts suitable for high-latency or unreliable networks.
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            auth_timeout: Duration::from_secs(15),
            send_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Check if a duration represents "no timeout" (zero or very large).
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365)
    }
}

/// Builder for [`LinkTimeouts`].
#[derive(Debug, Clone)]
pub struct LinkTimeoutsBuilder {
    timeouts: LinkTimeouts,
}

impl LinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: LinkTimeouts::default(),
        }
    }

    /// Set the socket open timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    /// Set the socket open timeout in seconds.
    pub fn connection_timeout_secs(self, secs: u64) -> Self {
        self.connection_timeout(Duration::from_secs(secs))
    }

    /// Set the STOMP handshake timeout.
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.auth_timeout = timeout;
        self
    }

    /// Set the STOMP handshake timeout in seconds.
    pub fn auth_timeout_secs(self, secs: u64) -> Self {
        self.auth_timeout(Duration::from_secs(secs))
    }

    /// Set the per-frame send timeout.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.send_timeout = timeout;
        self
    }

    /// Set the REST request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request_timeout = timeout;
        self
    }

    /// Build the timeout configuration.
    pub fn build(self) -> LinkTimeouts {
        self.timeouts
    }
}

/// Run `fut` under `timeout` unless the timeout means "no timeout".
pub(crate) async fn with_timeout<F, T>(timeout: Duration, what: &str, fut: F) -> crate::Result<T>
where
    F: std::future::Future<Output = crate::Result<T>>,
{
    if LinkTimeouts::is_no_timeout(timeout) {
        return fut.await;
    }
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(crate::LinkError::TimeoutError(format!("{} ({:?})", what, timeout))),
    }
}
