//! Subscriptions to STOMP destinations.
//!
//! - [`registry`]: destination-keyed handler registry owned by the
//!   connection task
//! - [`Subscription`]: caller-side handle returned by
//!   [`NotificationClient::subscribe`](crate::NotificationClient::subscribe)

pub mod registry;

use tokio::sync::mpsc;

use crate::connection::ConnCmd;
use crate::error::{LinkError, Result};

pub use registry::{MessageHandler, Removal, SubscriptionRegistry, SubscriptionToken};

/// Handle to one registered handler.
///
/// Dropping the handle leaves the handler registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it. `disconnect()` clears
/// every registration, after which `unsubscribe` is a no-op.
pub struct Subscription {
    token: SubscriptionToken,
    destination: String,
    cmd_tx: mpsc::Sender<ConnCmd>,
}

impl Subscription {
    pub(crate) fn new(
        token: SubscriptionToken,
        destination: String,
        cmd_tx: mpsc::Sender<ConnCmd>,
    ) -> Self {
        Self {
            token,
            destination,
            cmd_tx,
        }
    }

    pub fn token(&self) -> SubscriptionToken {
        self.token
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Remove the handler. The last handler of a destination also sends
    /// UNSUBSCRIBE on the live session.
    pub async fn unsubscribe(self) -> Result<()> {
        self.cmd_tx
            .send(ConnCmd::Unsubscribe { token: self.token })
            .await
            .map_err(|_| LinkError::WebSocketError("Connection task is not running".to_string()))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("token", &self.token)
            .field("destination", &self.destination)
            .finish()
    }
}
