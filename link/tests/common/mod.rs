//! Shared helpers for docflow-link integration tests.
//!
//! [`MockTransport`] stands in for the WebSocket transport: each connect
//! attempt follows a script (succeed or fail), every outbound frame is
//! recorded, and tests push inbound frames or break the live session.

#![allow(dead_code)]

use async_trait::async_trait;
use docflow_link::auth::{Role, SessionStore, User};
use docflow_link::stomp::{Command, Frame};
use docflow_link::transport::{ConnectRequest, Transport, TransportSession};
use docflow_link::{
    ConnectionOptions, ConnectionState, EventHandlers, LinkError, NotificationClient,
    NotificationSummaryStore, Result,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

pub const EMAIL: &str = "ana@uni.edu";
pub const TOKEN: &str = "jwt-ana";

#[derive(Default)]
struct MockState {
    script: VecDeque<bool>,
    default_ok: bool,
    latency: Option<Duration>,
    connects: Vec<(Instant, ConnectRequest)>,
    sent: Vec<(usize, Frame)>,
    sessions: Vec<Option<mpsc::UnboundedSender<Result<Frame>>>>,
    closed: usize,
}

pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Every attempt succeeds unless scripted otherwise.
    pub fn accepting() -> Arc<Self> {
        Self::with_default(true)
    }

    /// Every attempt fails unless scripted otherwise.
    pub fn refusing() -> Arc<Self> {
        Self::with_default(false)
    }

    fn with_default(default_ok: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(MockState {
                default_ok,
                ..MockState::default()
            })),
        })
    }

    /// Outcomes for the next attempts, in order.
    pub fn script(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.state.lock().unwrap().script.extend(outcomes);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = Some(latency);
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects.len()
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().connects.iter().map(|(t, _)| *t).collect()
    }

    pub fn last_request(&self) -> Option<ConnectRequest> {
        self.state.lock().unwrap().connects.last().map(|(_, r)| r.clone())
    }

    /// Frames with `command` written on session number `session` (0-based).
    pub fn sent_on(&self, session: usize, command: Command) -> Vec<Frame> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|(s, f)| *s == session && f.command == command)
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub fn sent(&self, command: Command) -> Vec<Frame> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|(_, f)| f.command == command)
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    pub fn closed_sessions(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    /// Push an inbound frame on the newest session.
    pub fn deliver(&self, frame: Frame) {
        self.push(Ok(frame));
    }

    /// Make the newest session report `err` (e.g. a missed heartbeat).
    pub fn break_session(&self, err: LinkError) {
        self.push(Err(err));
    }

    /// End the newest session's stream as if the server went away.
    pub fn end_session(&self) {
        if let Some(slot) = self.state.lock().unwrap().sessions.last_mut() {
            slot.take();
        }
    }

    fn push(&self, item: Result<Frame>) {
        let state = self.state.lock().unwrap();
        if let Some(Some(tx)) = state.sessions.last() {
            let _ = tx.send(item);
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn TransportSession>> {
        let (ok, latency) = {
            let mut state = self.state.lock().unwrap();
            state.connects.push((Instant::now(), request.clone()));
            let ok = state.script.pop_front().unwrap_or(state.default_ok);
            (ok, state.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if !ok {
            return Err(LinkError::NetworkError("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock().unwrap();
        state.sessions.push(Some(tx));
        Ok(Box::new(MockSession {
            index: state.sessions.len() - 1,
            inbound: rx,
            shared: self.state.clone(),
        }))
    }
}

struct MockSession {
    index: usize,
    inbound: mpsc::UnboundedReceiver<Result<Frame>>,
    shared: Arc<Mutex<MockState>>,
}

#[async_trait]
impl TransportSession for MockSession {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.shared.lock().unwrap().sent.push((self.index, frame));
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<Frame>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) {
        let mut state = self.shared.lock().unwrap();
        state.sent.push((self.index, Frame::disconnect()));
        state.closed += 1;
    }
}

pub fn signed_in_session() -> SessionStore {
    let session = SessionStore::new();
    session
        .set_auth(User::new(7, EMAIL, Role::Student).with_full_name("Ana Ruiz"), TOKEN)
        .unwrap();
    session
}

pub fn build_client(
    transport: Arc<MockTransport>,
    session: SessionStore,
    summary: NotificationSummaryStore,
    handlers: EventHandlers,
    options: ConnectionOptions,
) -> NotificationClient {
    NotificationClient::builder()
        .base_url("http://docflow.test")
        .transport(transport)
        .session_store(session)
        .summary_store(summary)
        .event_handlers(handlers)
        .connection_options(options)
        .build()
        .unwrap()
}

/// Client with default options, a signed-in session and no handlers.
pub fn default_client(transport: Arc<MockTransport>) -> NotificationClient {
    build_client(
        transport,
        signed_in_session(),
        NotificationSummaryStore::new(),
        EventHandlers::new(),
        ConnectionOptions::default(),
    )
}

/// Let spawned tasks run without advancing the paused clock.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

pub async fn wait_for_state(client: &NotificationClient, wanted: ConnectionState) {
    let mut rx = client.state_changes();
    tokio::time::timeout(Duration::from_secs(300), rx.wait_for(|s| *s == wanted))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", wanted))
        .unwrap();
}

pub fn message(destination: &str, body: &str) -> Frame {
    Frame::new(Command::Message)
        .header("destination", destination)
        .header("message-id", "m-1")
        .header("subscription", "sub-1")
        .body(body)
}

pub fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Assert consecutive connect attempts are spaced by `expected`, allowing a
/// millisecond of timer rounding.
pub fn assert_spacing(times: &[Instant], expected: &[u64]) {
    assert_eq!(times.len(), expected.len() + 1, "attempt count");
    for (i, want) in expected.iter().enumerate() {
        let gap = times[i + 1] - times[i];
        assert!(
            gap >= ms(*want) && gap <= ms(*want + 1),
            "gap {} was {:?}, expected {}ms",
            i,
            gap,
            want
        );
    }
}
