//! # docflow-link
//!
//! Real-time notification client for the DocFlow academic document
//! workflow service.
//!
//! Keeps a STOMP-over-WebSocket session to the server alive with
//! exponential backoff, routes pushed messages to per-destination handlers,
//! and maintains the unread/total counters behind notification badges.
//!
//! ## Layout
//!
//! - [`stomp`]: STOMP 1.2 frame codec and heartbeat negotiation
//! - [`transport`]: WebSocket transport with `/ws` to `/ws/websocket` fallback
//! - [`auth`]: signed-in session and its persistence
//! - [`NotificationClient`]: reconnecting client and subscription API
//! - [`NotificationSummaryStore`]: observable unread/total counters
//! - [`NotificationApi`]: REST calls that seed and adjust the summary
//!
//! ## Example
//!
//! ```rust,no_run
//! use docflow_link::auth::{Role, SessionStore, User};
//! use docflow_link::{NotificationClient, NotificationSummaryStore};
//!
//! # async fn example() -> docflow_link::Result<()> {
//! let session = SessionStore::new();
//! session.set_auth(User::new(7, "ana@uni.edu", Role::Student), "jwt")?;
//!
//! let summary = NotificationSummaryStore::new();
//! let client = NotificationClient::builder()
//!     .base_url("https://api.docflow.edu")
//!     .session_store(session.clone())
//!     .summary_store(summary.clone())
//!     .build()?;
//!
//! client.bind_session(&session);
//! let mut updates = summary.subscribe();
//! while updates.changed().await.is_ok() {
//!     println!("unread: {}", summary.unread_count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod connection;
pub mod error;
pub mod event_handlers;
pub mod models;
pub mod stomp;
pub mod store;
pub mod subscription;
pub mod timeouts;
pub mod transport;

pub use api::NotificationApi;
pub use auth::{AuthState, Credential, KeyValueStore, MemoryStorage, Role, SessionStore, User};
pub use client::{NotificationClient, NotificationClientBuilder};
pub use connection::{notifications_destination, summary_destination};
pub use error::{LinkError, Result};
pub use event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
pub use models::{
    ConnectionOptions, ConnectionState, Notification, NotificationPriority, NotificationSummary,
    NotificationType, Page,
};
pub use stomp::Frame;
pub use store::{NotificationSummaryStore, SummaryState};
pub use subscription::{Subscription, SubscriptionToken};
pub use timeouts::LinkTimeouts;
