//! Connection event loop.
//!
//! One task per client. Everything that mutates connection state goes
//! through the `tokio::select!` in [`ConnectionTask::run`]:
//!
//! - commands from the public handle ([`ConnCmd`])
//! - results of connect attempts, which run in their own task and are
//!   tagged with an epoch so that results from before a `disconnect()` are
//!   discarded
//! - the retry timer
//! - inbound frames from the live session

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::{notifications_destination, summary_destination};
use crate::auth::{Credential, SessionStore};
use crate::error::{LinkError, Result};
use crate::event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
use crate::models::{ConnectionOptions, ConnectionState, Notification, NotificationSummary};
use crate::stomp::{headers, Command, Frame, Heartbeat};
use crate::store::NotificationSummaryStore;
use crate::subscription::registry::{MessageHandler, SubscriptionRegistry, SubscriptionToken};
use crate::transport::{ConnectRequest, Transport, TransportSession};

/// Commands sent from the public API to the connection task.
pub(crate) enum ConnCmd {
    Connect,
    Disconnect {
        done_tx: Option<oneshot::Sender<()>>,
    },
    Subscribe {
        destination: String,
        handler: MessageHandler,
        result_tx: oneshot::Sender<SubscriptionToken>,
    },
    Unsubscribe {
        token: SubscriptionToken,
    },
    Send {
        frame: Frame,
        result_tx: oneshot::Sender<Result<()>>,
    },
    Shutdown,
}

struct AttemptOutcome {
    epoch: u64,
    credential: Credential,
    result: Result<Box<dyn TransportSession>>,
}

/// Everything the connection task needs at spawn time.
pub(crate) struct TaskHandles {
    pub base_url: String,
    pub transport: Arc<dyn Transport>,
    pub options: ConnectionOptions,
    pub session_store: SessionStore,
    pub summary_store: NotificationSummaryStore,
    pub handlers: EventHandlers,
    pub state_tx: watch::Sender<ConnectionState>,
    pub attempts: Arc<AtomicU32>,
}

pub(crate) fn spawn_connection_task(
    runtime: &tokio::runtime::Handle,
    handles: TaskHandles,
    cmd_rx: mpsc::Receiver<ConnCmd>,
) -> JoinHandle<()> {
    let (attempt_tx, attempt_rx) = mpsc::unbounded_channel();
    let task = ConnectionTask {
        base_url: handles.base_url,
        transport: handles.transport,
        options: handles.options,
        session_store: handles.session_store,
        summary_store: handles.summary_store,
        handlers: handles.handlers,
        state_tx: handles.state_tx,
        attempts_gauge: handles.attempts,
        registry: SubscriptionRegistry::new(),
        wire_subs: HashMap::new(),
        next_wire_id: 0,
        user_subs: None,
        session: None,
        attempts: 0,
        retry_at: None,
        epoch: 0,
        in_flight: false,
        attempt_tx,
    };
    runtime.spawn(task.run(cmd_rx, attempt_rx))
}

/// Per-user subscriptions registered for the current connect cycle.
struct UserSubscriptions {
    email: String,
    tokens: [SubscriptionToken; 2],
}

struct ConnectionTask {
    base_url: String,
    transport: Arc<dyn Transport>,
    options: ConnectionOptions,
    session_store: SessionStore,
    summary_store: NotificationSummaryStore,
    handlers: EventHandlers,
    state_tx: watch::Sender<ConnectionState>,
    attempts_gauge: Arc<AtomicU32>,

    registry: SubscriptionRegistry,
    /// destination -> STOMP subscription id on the current session
    wire_subs: HashMap<String, String>,
    next_wire_id: u64,
    user_subs: Option<UserSubscriptions>,

    session: Option<Box<dyn TransportSession>>,
    attempts: u32,
    retry_at: Option<Instant>,
    epoch: u64,
    in_flight: bool,
    attempt_tx: mpsc::UnboundedSender<AttemptOutcome>,
}

async fn next_frame(session: &mut Option<Box<dyn TransportSession>>) -> Option<Result<Frame>> {
    match session {
        Some(session) => session.next_frame().await,
        None => std::future::pending().await,
    }
}

impl ConnectionTask {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<ConnCmd>,
        mut attempt_rx: mpsc::UnboundedReceiver<AttemptOutcome>,
    ) {
        loop {
            let retry_at = self.retry_at;
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(ConnCmd::Shutdown) | None => {
                        self.disconnect().await;
                        log::debug!("[docflow-link] Connection task stopped");
                        return;
                    },
                    Some(cmd) => self.handle_command(cmd).await,
                },
                Some(outcome) = attempt_rx.recv() => self.on_attempt(outcome).await,
                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    self.retry_at = None;
                    log::debug!("[docflow-link] Retry timer fired");
                    self.connect();
                },
                frame = next_frame(&mut self.session) => self.on_frame(frame).await,
            }
        }
    }

    async fn handle_command(&mut self, cmd: ConnCmd) {
        match cmd {
            ConnCmd::Connect => self.connect(),
            ConnCmd::Disconnect { done_tx } => {
                self.disconnect().await;
                if let Some(tx) = done_tx {
                    let _ = tx.send(());
                }
            },
            ConnCmd::Subscribe {
                destination,
                handler,
                result_tx,
            } => {
                let token = self.registry.add(destination.clone(), handler);
                if self.session.is_some() && !self.wire_subs.contains_key(&destination) {
                    self.send_subscribe(&destination).await;
                }
                let _ = result_tx.send(token);
            },
            ConnCmd::Unsubscribe { token } => self.unsubscribe(token).await,
            ConnCmd::Send { frame, result_tx } => {
                let result = self.send_message(frame).await;
                let _ = result_tx.send(result);
            },
            ConnCmd::Shutdown => self.disconnect().await,
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn transition(&mut self, next: ConnectionState) -> bool {
        let current = self.state();
        if !current.can_transition_to(next) {
            log::warn!("[docflow-link] Rejected state transition {} -> {}", current, next);
            return false;
        }
        self.state_tx.send_replace(next);
        if current != next {
            log::debug!("[docflow-link] State {} -> {}", current, next);
            self.handlers.emit_state_change(next);
        }
        true
    }

    fn set_attempts(&mut self, attempts: u32) {
        self.attempts = attempts;
        self.attempts_gauge.store(attempts, Ordering::Relaxed);
    }

    fn connect(&mut self) {
        if self.session.is_some() || self.in_flight {
            log::debug!("[docflow-link] connect() ignored: already {}", self.state());
            return;
        }
        let Some(credential) = self.session_store.credential() else {
            log::warn!("[docflow-link] connect() skipped: no authenticated session");
            if self.state() == ConnectionState::Reconnecting {
                self.retry_at = None;
                self.set_attempts(0);
                self.transition(ConnectionState::Disconnected);
            }
            return;
        };

        match self.state() {
            ConnectionState::Reconnecting => {},
            ConnectionState::Failed | ConnectionState::Disconnected => {
                self.set_attempts(0);
                self.transition(ConnectionState::Connecting);
            },
            other => {
                if !self.transition(ConnectionState::Connecting) {
                    log::warn!("[docflow-link] connect() ignored in state {}", other);
                    return;
                }
            },
        }

        self.retry_at = None;
        self.in_flight = true;
        let epoch = self.epoch;
        let transport = self.transport.clone();
        let request = ConnectRequest {
            base_url: self.base_url.clone(),
            token: Some(credential.token.clone()),
            heartbeat: Heartbeat::new(
                self.options.heartbeat_outgoing_ms,
                self.options.heartbeat_incoming_ms,
            ),
        };
        let attempt_tx = self.attempt_tx.clone();
        log::info!(
            "[docflow-link] Connecting to {} as {} (retry {})",
            self.base_url,
            credential.subject_email,
            self.attempts
        );
        tokio::spawn(async move {
            let result = transport.connect(&request).await;
            let _ = attempt_tx.send(AttemptOutcome {
                epoch,
                credential,
                result,
            });
        });
    }

    async fn on_attempt(&mut self, outcome: AttemptOutcome) {
        if outcome.epoch != self.epoch {
            if let Ok(mut stale) = outcome.result {
                log::debug!("[docflow-link] Closing session from a superseded attempt");
                stale.close().await;
            }
            return;
        }
        self.in_flight = false;
        match outcome.result {
            Ok(session) => self.on_connected(session, outcome.credential).await,
            Err(e) => self.on_transport_error(e).await,
        }
    }

    async fn on_connected(&mut self, session: Box<dyn TransportSession>, credential: Credential) {
        let was_retrying = self.attempts > 0;
        self.session = Some(session);
        self.set_attempts(0);
        self.transition(ConnectionState::Connected);

        self.ensure_user_subscriptions(&credential.subject_email);
        self.wire_subs.clear();
        let destinations = self.registry.destinations();
        log::info!(
            "[docflow-link] Connected; subscribing {} destination(s)",
            destinations.len()
        );
        for destination in destinations {
            if self.session.is_none() {
                return;
            }
            self.send_subscribe(&destination).await;
        }
        if self.session.is_none() {
            return;
        }

        self.handlers.emit_connect();
        if was_retrying {
            self.handlers.emit_reconnect();
        }
    }

    fn ensure_user_subscriptions(&mut self, email: &str) {
        if let Some(existing) = &self.user_subs {
            if existing.email == email {
                return;
            }
        }
        if let Some(stale) = self.user_subs.take() {
            for token in stale.tokens {
                self.registry.remove(token);
            }
        }

        let store = self.summary_store.clone();
        let handlers = self.handlers.clone();
        let on_notification: MessageHandler = Arc::new(move |frame: &Frame| {
            match serde_json::from_str::<Notification>(&frame.body) {
                Ok(notification) => {
                    store.increment_unread_count();
                    handlers.emit_notification(&notification);
                },
                Err(e) => log::warn!("[docflow-link] Dropping malformed notification: {}", e),
            }
        });

        let store = self.summary_store.clone();
        let on_summary: MessageHandler = Arc::new(move |frame: &Frame| {
            match serde_json::from_str::<NotificationSummary>(&frame.body) {
                Ok(summary) => store.set_summary(summary),
                Err(e) => log::warn!("[docflow-link] Dropping malformed summary: {}", e),
            }
        });

        let tokens = [
            self.registry.add(notifications_destination(email), on_notification),
            self.registry.add(summary_destination(email), on_summary),
        ];
        self.user_subs = Some(UserSubscriptions {
            email: email.to_string(),
            tokens,
        });
    }

    async fn send_subscribe(&mut self, destination: &str) {
        self.next_wire_id += 1;
        let id = format!("sub-{}", self.next_wire_id);
        match self.send_frame(Frame::subscribe(&id, destination)).await {
            Ok(()) => {
                log::debug!("[docflow-link] Subscribed {} as {}", destination, id);
                self.wire_subs.insert(destination.to_string(), id);
            },
            Err(e) => {
                log::warn!("[docflow-link] SUBSCRIBE {} failed: {}", destination, e);
                self.on_transport_error(e).await;
            },
        }
    }

    async fn unsubscribe(&mut self, token: SubscriptionToken) {
        let Some(removal) = self.registry.remove(token) else {
            return;
        };
        if !removal.destination_empty {
            return;
        }
        let Some(id) = self.wire_subs.remove(&removal.destination) else {
            return;
        };
        if self.session.is_some() {
            if let Err(e) = self.send_frame(Frame::unsubscribe(&id)).await {
                log::warn!("[docflow-link] UNSUBSCRIBE {} failed: {}", removal.destination, e);
                self.on_transport_error(e).await;
            }
        }
    }

    async fn send_message(&mut self, frame: Frame) -> Result<()> {
        if self.session.is_none() || !self.state().is_connected() {
            log::warn!(
                "[docflow-link] Not connected; dropping message to {}",
                frame.destination().unwrap_or("?")
            );
            return Ok(());
        }
        match self.send_frame(frame).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.on_transport_error(e.clone()).await;
                Err(e)
            },
        }
    }

    async fn send_frame(&mut self, frame: Frame) -> Result<()> {
        match self.session.as_mut() {
            Some(session) => session.send(frame).await,
            None => Err(LinkError::WebSocketError("No active session".to_string())),
        }
    }

    async fn on_frame(&mut self, frame: Option<Result<Frame>>) {
        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return self.on_transport_error(e).await,
            None => {
                return self
                    .on_transport_error(LinkError::WebSocketError(
                        "Connection closed by server".to_string(),
                    ))
                    .await;
            },
        };

        match frame.command {
            Command::Message => {
                let destination = match frame.destination() {
                    Some(d) => d.to_string(),
                    None => match frame.get_header(headers::SUBSCRIPTION).and_then(|id| {
                        self.wire_subs.iter().find(|(_, v)| v.as_str() == id).map(|(k, _)| k.clone())
                    }) {
                        Some(d) => d,
                        None => {
                            log::debug!("[docflow-link] MESSAGE without routable destination");
                            return;
                        },
                    },
                };
                let delivered = self.registry.dispatch(&destination, &frame);
                if delivered == 0 {
                    log::debug!("[docflow-link] No handler for {}", destination);
                }
            },
            Command::Receipt => {
                log::debug!("[docflow-link] RECEIPT {}", frame.get_header(headers::RECEIPT).unwrap_or(""));
            },
            other => log::debug!("[docflow-link] Ignoring inbound {}", other),
        }
    }

    async fn on_transport_error(&mut self, err: LinkError) {
        let was_connected = self.session.take().is_some() && self.state().is_connected();
        self.wire_subs.clear();
        log::warn!("[docflow-link] Transport error: {}", err);
        if was_connected {
            self.handlers.emit_disconnect(DisconnectReason::new(err.to_string()));
        }

        if self.options.allows_retry(self.attempts) {
            let delay = self.options.backoff_delay(self.attempts);
            self.set_attempts(self.attempts + 1);
            self.transition(ConnectionState::Reconnecting);
            self.retry_at = Some(Instant::now() + delay);
            log::info!(
                "[docflow-link] Reconnecting in {:?} (attempt {}{})",
                delay,
                self.attempts,
                self.options
                    .max_reconnect_attempts
                    .map(|m| format!("/{}", m))
                    .unwrap_or_default()
            );
            return;
        }

        if !self.options.auto_reconnect {
            self.transition(ConnectionState::Disconnected);
            self.handlers.emit_error(ConnectionError::new(
                format!("Connection lost: {}", err),
                err.is_recoverable(),
            ));
            return;
        }

        let target = if self.state().can_transition_to(ConnectionState::Failed) {
            ConnectionState::Failed
        } else {
            ConnectionState::Disconnected
        };
        self.transition(target);
        log::error!(
            "[docflow-link] Giving up after {} reconnect attempt(s): {}",
            self.attempts,
            err
        );
        self.handlers.emit_error(ConnectionError::new(
            format!(
                "Real-time notifications are unavailable after {} reconnect attempts ({}). \
                 Reload to try again.",
                self.attempts, err
            ),
            false,
        ));
    }

    async fn disconnect(&mut self) {
        self.retry_at = None;
        self.epoch += 1;
        self.in_flight = false;
        self.registry.clear();
        self.user_subs = None;
        self.wire_subs.clear();
        self.set_attempts(0);

        let was_connected = match self.session.take() {
            Some(mut session) => {
                session.close().await;
                true
            },
            None => false,
        };
        self.transition(ConnectionState::Disconnected);
        if was_connected {
            log::info!("[docflow-link] Disconnected");
            self.handlers.emit_disconnect(DisconnectReason::new("Client disconnected"));
        }
    }
}
