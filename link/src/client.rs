//! Reconnecting notification client with builder pattern.
//!
//! The public handle only sends commands; the background connection task
//! owns the session, the subscription registry and the state machine.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::{
    api::NotificationApi,
    auth::SessionStore,
    connection::{spawn_connection_task, ConnCmd, TaskHandles},
    error::{LinkError, Result},
    event_handlers::EventHandlers,
    models::{ConnectionOptions, ConnectionState},
    stomp::Frame,
    store::NotificationSummaryStore,
    subscription::{MessageHandler, Subscription},
    timeouts::LinkTimeouts,
    transport::{FallbackTransport, Transport, WsTransport},
};

/// Capacity of the command channel between handles and the connection task.
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Real-time notification client.
///
/// Use [`NotificationClientBuilder`] to construct instances.
///
/// # Examples
///
/// ```rust,no_run
/// use docflow_link::{auth::SessionStore, EventHandlers, NotificationClient, NotificationSummaryStore};
///
/// # async fn example() -> docflow_link::Result<()> {
/// let session = SessionStore::new();
/// let summary = NotificationSummaryStore::new();
///
/// let client = NotificationClient::builder()
///     .base_url("https://api.docflow.edu")
///     .session_store(session.clone())
///     .summary_store(summary.clone())
///     .event_handlers(EventHandlers::new().on_notification(|n| println!("{}", n.title)))
///     .build()?;
///
/// client.connect().await?;
/// let sub = client
///     .subscribe("/topic/documents/42", |frame| println!("{}", frame.body))
///     .await?;
/// sub.unsubscribe().await?;
/// client.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct NotificationClient {
    base_url: String,
    cmd_tx: mpsc::Sender<ConnCmd>,
    state_rx: watch::Receiver<ConnectionState>,
    attempts: Arc<AtomicU32>,
    session_store: SessionStore,
    summary_store: NotificationSummaryStore,
    timeouts: LinkTimeouts,
    task: JoinHandle<()>,
}

impl NotificationClient {
    pub fn builder() -> NotificationClientBuilder {
        NotificationClientBuilder::new()
    }

    async fn send_cmd(&self, cmd: ConnCmd) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| LinkError::WebSocketError("Connection task is not running".to_string()))
    }

    /// Start connecting with the session store's current credential.
    ///
    /// Returns once the request is queued; watch [`state_changes`](Self::state_changes)
    /// or the event handlers for the outcome. A no-op while connected or
    /// while an attempt is in flight, and without an authenticated session.
    pub async fn connect(&self) -> Result<()> {
        self.send_cmd(ConnCmd::Connect).await
    }

    /// Cancel any scheduled retry, drop all subscriptions and close the
    /// session. Resolves once the client is `Disconnected`.
    pub async fn disconnect(&self) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send_cmd(ConnCmd::Disconnect {
            done_tx: Some(done_tx),
        })
        .await?;
        done_rx.await.map_err(|_| LinkError::Cancelled)
    }

    /// Register `callback` for MESSAGE frames on `destination`.
    ///
    /// Sent to the server right away when connected, otherwise on the next
    /// successful connect.
    pub async fn subscribe<F>(&self, destination: impl Into<String>, callback: F) -> Result<Subscription>
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        let destination = destination.into();
        let handler: MessageHandler = Arc::new(callback);
        let (result_tx, result_rx) = oneshot::channel();
        self.send_cmd(ConnCmd::Subscribe {
            destination: destination.clone(),
            handler,
            result_tx,
        })
        .await?;
        let token = result_rx.await.map_err(|_| {
            LinkError::WebSocketError("Connection task died before confirming subscribe".to_string())
        })?;
        Ok(Subscription::new(token, destination, self.cmd_tx.clone()))
    }

    /// Publish `body` as JSON to `destination`.
    ///
    /// While not connected the message is dropped with a warning and
    /// `Ok(())` is returned; nothing is queued.
    pub async fn send_message<T: Serialize + ?Sized>(&self, destination: &str, body: &T) -> Result<()> {
        let payload = serde_json::to_string(body)?;
        let (result_tx, result_rx) = oneshot::channel();
        self.send_cmd(ConnCmd::Send {
            frame: Frame::send(destination, payload),
            result_tx,
        })
        .await?;
        result_rx.await.map_err(|_| LinkError::Cancelled)?
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Automatic retries scheduled since the last successful connect.
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn session_store(&self) -> &SessionStore {
        &self.session_store
    }

    pub fn summary_store(&self) -> &NotificationSummaryStore {
        &self.summary_store
    }

    /// REST client sharing this client's base URL and session.
    pub fn api(&self) -> Result<NotificationApi> {
        NotificationApi::new(self.base_url.clone(), self.session_store.clone(), &self.timeouts)
    }

    /// Follow sign-in state: connect when `session` becomes authenticated
    /// (immediately if it already is) and disconnect on sign-out.
    ///
    /// The watcher stops when the client shuts down or `session` is dropped.
    pub fn bind_session(&self, session: &SessionStore) -> JoinHandle<()> {
        let mut auth_rx = session.subscribe();
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let mut authenticated = auth_rx.borrow_and_update().is_authenticated;
            if authenticated && cmd_tx.send(ConnCmd::Connect).await.is_err() {
                return;
            }
            while auth_rx.changed().await.is_ok() {
                let now = auth_rx.borrow_and_update().is_authenticated;
                if now == authenticated {
                    continue;
                }
                authenticated = now;
                let cmd = if now {
                    log::debug!("[docflow-link] Session signed in; connecting");
                    ConnCmd::Connect
                } else {
                    log::debug!("[docflow-link] Session signed out; disconnecting");
                    ConnCmd::Disconnect { done_tx: None }
                };
                if cmd_tx.send(cmd).await.is_err() {
                    break;
                }
            }
        })
    }

    /// Disconnect and stop the connection task.
    pub async fn shutdown(mut self) {
        let _ = self.cmd_tx.send(ConnCmd::Shutdown).await;
        let _ = (&mut self.task).await;
    }
}

impl Drop for NotificationClient {
    fn drop(&mut self) {
        let _ = self.cmd_tx.try_send(ConnCmd::Shutdown);
    }
}

impl std::fmt::Debug for NotificationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationClient")
            .field("base_url", &self.base_url)
            .field("state", &self.state())
            .field("reconnect_attempts", &self.reconnect_attempts())
            .finish()
    }
}

/// Builder for configuring [`NotificationClient`] instances.
pub struct NotificationClientBuilder {
    base_url: Option<String>,
    session_store: Option<SessionStore>,
    summary_store: Option<NotificationSummaryStore>,
    event_handlers: EventHandlers,
    connection_options: ConnectionOptions,
    timeouts: LinkTimeouts,
    transport: Option<Arc<dyn Transport>>,
}

impl NotificationClientBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            session_store: None,
            summary_store: None,
            event_handlers: EventHandlers::default(),
            connection_options: ConnectionOptions::default(),
            timeouts: LinkTimeouts::default(),
            transport: None,
        }
    }

    /// API origin, e.g. `https://api.docflow.edu`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Source of the bearer token. Defaults to an empty in-memory session.
    pub fn session_store(mut self, store: SessionStore) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Store fed by pushed notifications and summaries.
    pub fn summary_store(mut self, store: NotificationSummaryStore) -> Self {
        self.summary_store = Some(store);
        self
    }

    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection_options = options;
        self
    }

    pub fn timeouts(mut self, timeouts: LinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Replace the WebSocket transport, e.g. with an in-memory one in tests.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client and spawn its connection task on the current tokio
    /// runtime.
    pub fn build(self) -> Result<NotificationClient> {
        let base_url = self
            .base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| LinkError::ConfigurationError("base_url is required".into()))?;
        crate::transport::websocket::resolve_ws_url(&base_url, &self.connection_options.ws_path)?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            LinkError::ConfigurationError(
                "NotificationClient must be built inside a tokio runtime".to_string(),
            )
        })?;

        let options = self.connection_options;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => {
                let primary = WsTransport::new(options.ws_path.clone(), self.timeouts.clone());
                match &options.fallback_ws_path {
                    Some(path) => Arc::new(FallbackTransport::new(
                        primary,
                        WsTransport::new(path.clone(), self.timeouts.clone()),
                    )),
                    None => Arc::new(primary),
                }
            },
        };

        let session_store = self.session_store.unwrap_or_default();
        let summary_store = self.summary_store.unwrap_or_default();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let attempts = Arc::new(AtomicU32::new(0));
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let task = spawn_connection_task(
            &runtime,
            TaskHandles {
                base_url: base_url.clone(),
                transport,
                options,
                session_store: session_store.clone(),
                summary_store: summary_store.clone(),
                handlers: self.event_handlers,
                state_tx,
                attempts: attempts.clone(),
            },
            cmd_rx,
        );

        Ok(NotificationClient {
            base_url,
            cmd_tx,
            state_rx,
            attempts,
            session_store,
            summary_store,
            timeouts: self.timeouts,
            task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_pattern() {
        let client = NotificationClient::builder()
            .base_url("http://localhost:8080/")
            .timeouts(LinkTimeouts::fast())
            .build()
            .unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.reconnect_attempts(), 0);
        assert_eq!(client.api().unwrap().base_url(), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_builder_missing_url() {
        assert!(matches!(
            NotificationClient::builder().build(),
            Err(LinkError::ConfigurationError(_))
        ));
        assert!(matches!(
            NotificationClient::builder().base_url("ftp://files").build(),
            Err(LinkError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_builder_requires_runtime() {
        let result = NotificationClient::builder().base_url("http://localhost:8080").build();
        assert!(matches!(result, Err(LinkError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_connect_without_session_is_noop() {
        let client = NotificationClient::builder()
            .base_url("http://localhost:8080")
            .build()
            .unwrap();
        client.connect().await.unwrap();
        client.disconnect().await.unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
