//! Connection transport.
//!
//! - [`Transport`]: opens an authenticated STOMP session to the server
//! - [`TransportSession`]: a live session; yields inbound frames and keeps
//!   the negotiated heartbeat alive
//! - [`websocket`]: native WebSocket implementation
//! - [`FallbackTransport`]: tries a primary transport, then a secondary one
//!   when the socket upgrade is refused

pub mod websocket;

use async_trait::async_trait;

use crate::error::{LinkError, Result};
use crate::stomp::{Frame, Heartbeat};

pub use websocket::WsTransport;

/// Everything a transport needs to open a session.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// API origin, e.g. `https://api.docflow.edu`.
    pub base_url: String,
    /// Bearer token attached as a connect-time header.
    pub token: Option<String>,
    /// Heartbeat intervals requested from the server.
    pub heartbeat: Heartbeat,
}

/// Opens sessions to the notification endpoint.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open the socket and complete the STOMP handshake.
    async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn TransportSession>>;
}

/// A connected STOMP session.
///
/// Heartbeat emission and inbound liveness checks are the session's job;
/// a missed heartbeat surfaces as an error from [`next_frame`](Self::next_frame).
#[async_trait]
pub trait TransportSession: Send {
    /// Write a frame to the server.
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Next inbound frame. `None` means the stream ended.
    async fn next_frame(&mut self) -> Option<Result<Frame>>;

    /// Send DISCONNECT (best effort) and close the socket.
    async fn close(&mut self);
}

/// Tries `primary` first and falls back to `fallback` when the primary
/// socket cannot be opened. Authentication failures are returned as-is.
pub struct FallbackTransport<P, F> {
    primary: P,
    fallback: F,
}

impl<P: Transport, F: Transport> FallbackTransport<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl<P: Transport, F: Transport> Transport for FallbackTransport<P, F> {
    async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn TransportSession>> {
        match self.primary.connect(request).await {
            Ok(session) => Ok(session),
            Err(LinkError::WebSocketError(msg)) => {
                log::warn!("[docflow-link] Primary transport unavailable ({}), trying fallback", msg);
                self.fallback.connect(request).await
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct NullSession;

    #[async_trait]
    impl TransportSession for NullSession {
        async fn send(&mut self, _frame: Frame) -> Result<()> {
            Ok(())
        }
        async fn next_frame(&mut self) -> Option<Result<Frame>> {
            None
        }
        async fn close(&mut self) {}
    }

    struct Scripted {
        result: fn() -> Result<()>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn connect(&self, _request: &ConnectRequest) -> Result<Box<dyn TransportSession>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)().map(|()| Box::new(NullSession) as Box<dyn TransportSession>)
        }
    }

    fn request() -> ConnectRequest {
        ConnectRequest {
            base_url: "http://localhost:8080".into(),
            token: Some("t".into()),
            heartbeat: Heartbeat::new(4000, 4000),
        }
    }

    fn scripted(result: fn() -> Result<()>) -> (Scripted, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Scripted { result, calls: calls.clone() }, calls)
    }

    #[tokio::test]
    async fn test_fallback_used_when_upgrade_refused() {
        let (primary, primary_calls) =
            scripted(|| Err(LinkError::WebSocketError("HTTP 404".into())));
        let (fallback, fallback_calls) = scripted(|| Ok(()));

        let transport = FallbackTransport::new(primary, fallback);
        assert!(transport.connect(&request()).await.is_ok());
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_skipped_on_auth_failure() {
        let (primary, _) = scripted(|| Err(LinkError::AuthenticationError("401".into())));
        let (fallback, fallback_calls) = scripted(|| Ok(()));

        let transport = FallbackTransport::new(primary, fallback);
        let result = transport.connect(&request()).await;
        assert!(matches!(result, Err(LinkError::AuthenticationError(_))));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }
}
