//! Native WebSocket transport speaking STOMP 1.2.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        error::Error as WsError,
        http::header::{HeaderValue, AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL},
        http::Request,
        protocol::Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use url::Url;

use super::{ConnectRequest, Transport, TransportSession};
use crate::error::{LinkError, Result};
use crate::stomp::{headers, Command, Frame, FrameDecoder, Heartbeat, STOMP_SUBPROTOCOLS};
use crate::timeouts::{with_timeout, LinkTimeouts};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound silence tolerated before the session is declared dead, as a
/// multiple of the negotiated incoming heartbeat.
const READ_GRACE_FACTOR: u32 = 2;

/// Opens STOMP sessions over a WebSocket at `path` below the API origin.
#[derive(Debug, Clone)]
pub struct WsTransport {
    path: String,
    timeouts: LinkTimeouts,
}

impl WsTransport {
    pub fn new(path: impl Into<String>, timeouts: LinkTimeouts) -> Self {
        Self {
            path: path.into(),
            timeouts,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn TransportSession>> {
        let url = resolve_ws_url(&request.base_url, &self.path)?;
        let mut upgrade = url.as_str().into_client_request().map_err(|e| {
            LinkError::ConfigurationError(format!("Invalid WebSocket URL '{}': {}", url, e))
        })?;
        apply_upgrade_headers(&mut upgrade, request.token.as_deref())?;

        log::debug!("[docflow-link] Opening WebSocket {}", url);
        let (stream, _response) =
            with_timeout(self.timeouts.connection_timeout, "WebSocket connect timed out", async {
                connect_async(upgrade).await.map_err(map_upgrade_error)
            })
            .await?;

        let mut session = WsSession::new(stream, self.timeouts.send_timeout);
        let connect = Frame::connect(&host_header(&url), request.token.as_deref(), request.heartbeat);
        let handshake = async {
            session.send(connect).await?;
            session.await_connected().await
        };
        let connected =
            match with_timeout(self.timeouts.auth_timeout, "STOMP CONNECTED not received", handshake)
                .await
            {
                Ok(frame) => frame,
                Err(e) => {
                    let _ = session.stream.close(None).await;
                    return Err(e);
                },
            };

        let server_heartbeat = match connected.get_header(headers::HEART_BEAT) {
            Some(value) => Heartbeat::parse(value).unwrap_or_else(|e| {
                log::warn!("[docflow-link] Ignoring server heart-beat header: {}", e);
                Heartbeat::new(0, 0)
            }),
            None => Heartbeat::new(0, 0),
        };
        let (send_every, expect_every) = Heartbeat::negotiate(request.heartbeat, server_heartbeat);
        session.start_heartbeat(send_every, expect_every);

        log::info!(
            "[docflow-link] STOMP session established at {} (version {}, heartbeat out={:?} in={:?})",
            url,
            connected.get_header(headers::VERSION).unwrap_or("1.0"),
            send_every,
            expect_every
        );
        Ok(Box::new(session))
    }
}

/// A live STOMP session over one WebSocket.
pub struct WsSession {
    stream: WsStream,
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
    send_timeout: Duration,
    send_every: Duration,
    expect_every: Duration,
    next_beat: Instant,
    read_deadline: Instant,
}

impl WsSession {
    fn new(stream: WsStream, send_timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            stream,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            send_timeout,
            send_every: Duration::ZERO,
            expect_every: Duration::ZERO,
            next_beat: now,
            read_deadline: now,
        }
    }

    fn start_heartbeat(&mut self, send_every: Duration, expect_every: Duration) {
        let now = Instant::now();
        self.send_every = send_every;
        self.expect_every = expect_every;
        self.next_beat = now + send_every;
        self.read_deadline = now + expect_every * READ_GRACE_FACTOR;
    }

    async fn await_connected(&mut self) -> Result<Frame> {
        loop {
            while let Some(frame) = self.pending.pop_front() {
                match frame.command {
                    Command::Connected => return Ok(frame),
                    Command::Error => {
                        return Err(LinkError::AuthenticationError(frame.error_message()));
                    },
                    other => {
                        log::debug!("[docflow-link] Ignoring {} before CONNECTED", other);
                    },
                }
            }
            let msg = self.stream.next().await;
            if !self.ingest(msg)? {
                return Err(LinkError::WebSocketError(
                    "Connection closed during STOMP handshake".to_string(),
                ));
            }
        }
    }

    /// Feed one socket message into the decoder. `Ok(false)` means the
    /// stream ended cleanly.
    fn ingest(&mut self, msg: Option<std::result::Result<Message, WsError>>) -> Result<bool> {
        if !self.expect_every.is_zero() {
            self.read_deadline = Instant::now() + self.expect_every * READ_GRACE_FACTOR;
        }
        match msg {
            Some(Ok(Message::Text(text))) => self.decoder.push(text.as_str()),
            Some(Ok(Message::Binary(data))) => {
                let text = std::str::from_utf8(&data).map_err(|e| {
                    LinkError::ProtocolError(format!("Binary frame is not UTF-8: {}", e))
                })?;
                self.decoder.push(text);
            },
            Some(Ok(Message::Close(Some(close)))) => {
                return Err(LinkError::WebSocketError(format!(
                    "Connection closed by server (code {}): {}",
                    u16::from(close.code),
                    close.reason.as_str()
                )));
            },
            Some(Ok(Message::Close(None))) | None => return Ok(false),
            Some(Ok(_)) => {},
            Some(Err(e)) => return Err(e.into()),
        }
        while let Some(frame) = self.decoder.next_frame()? {
            self.pending.push_back(frame);
        }
        Ok(true)
    }

    async fn write_text(&mut self, text: String) -> Result<()> {
        let stream = &mut self.stream;
        with_timeout(self.send_timeout, "WebSocket send timed out", async move {
            stream.send(Message::Text(text.into())).await.map_err(LinkError::from)
        })
        .await?;
        self.next_beat = Instant::now() + self.send_every;
        Ok(())
    }
}

#[async_trait]
impl TransportSession for WsSession {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        log::trace!("[docflow-link] >>> {}", frame.command);
        self.write_text(frame.encode()).await
    }

    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                if frame.command == Command::Error {
                    return Some(Err(LinkError::ProtocolError(frame.error_message())));
                }
                log::trace!("[docflow-link] <<< {}", frame.command);
                return Some(Ok(frame));
            }

            let send_every = self.send_every;
            let expect_every = self.expect_every;
            tokio::select! {
                _ = sleep_until(self.next_beat), if !send_every.is_zero() => {
                    if let Err(e) = self.write_text("\n".to_string()).await {
                        return Some(Err(e));
                    }
                }
                _ = sleep_until(self.read_deadline), if !expect_every.is_zero() => {
                    return Some(Err(LinkError::TimeoutError(format!(
                        "No data from server within {:?}",
                        expect_every * READ_GRACE_FACTOR
                    ))));
                }
                msg = self.stream.next() => {
                    match self.ingest(msg) {
                        Ok(true) => {},
                        Ok(false) => return None,
                        Err(e) => return Some(Err(e)),
                    }
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.send(Frame::disconnect()).await;
        let _ = self.stream.close(None).await;
    }
}

/// Build the WebSocket endpoint from the API origin: `http` becomes `ws`,
/// `https` becomes `wss`, and `path` is appended to the base path.
pub fn resolve_ws_url(base_url: &str, path: &str) -> Result<Url> {
    let base = Url::parse(base_url.trim()).map_err(|e| {
        LinkError::ConfigurationError(format!("Invalid base_url '{}': {}", base_url, e))
    })?;

    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(LinkError::ConfigurationError(format!(
                "Unsupported base_url scheme '{}'; expected http(s) or ws(s)",
                other
            )));
        },
    };
    if base.host_str().is_none() {
        return Err(LinkError::ConfigurationError(format!(
            "base_url '{}' has no host",
            base_url
        )));
    }

    let mut ws_url = base.clone();
    ws_url
        .set_scheme(scheme)
        .map_err(|_| LinkError::ConfigurationError(format!("Cannot use scheme '{}'", scheme)))?;
    let joined = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    ws_url.set_path(&joined);
    ws_url.set_query(None);
    ws_url.set_fragment(None);
    Ok(ws_url)
}

/// Value for the STOMP `host` header.
fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or("localhost");
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

fn apply_upgrade_headers(request: &mut Request<()>, token: Option<&str>) -> Result<()> {
    request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(STOMP_SUBPROTOCOLS));
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            LinkError::ConfigurationError(format!("Invalid token for Authorization header: {}", e))
        })?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(())
}

fn map_upgrade_error(err: WsError) -> LinkError {
    match err {
        WsError::Http(response) => match response.status().as_u16() {
            401 => LinkError::AuthenticationError(
                "Unauthorized: WebSocket requires a valid token".to_string(),
            ),
            403 => LinkError::AuthenticationError("Forbidden: WebSocket access denied".to_string()),
            code => LinkError::WebSocketError(format!("WebSocket upgrade rejected: HTTP {}", code)),
        },
        WsError::Io(e) => LinkError::NetworkError(e.to_string()),
        WsError::Url(e) => LinkError::ConfigurationError(e.to_string()),
        other => LinkError::WebSocketError(other.to_string()),
    }
}
