//! Background connection management.
//!
//! - [`task`]: the per-client event loop that owns the transport session,
//!   the subscription registry and the reconnect state machine

pub(crate) mod task;

pub(crate) use task::{spawn_connection_task, ConnCmd, TaskHandles};

/// Destination carrying individual notifications for `email`.
pub fn notifications_destination(email: &str) -> String {
    format!("/user/{}/topic/notifications", email)
}

/// Destination carrying the aggregate summary for `email`.
pub fn summary_destination(email: &str) -> String {
    format!("/user/{}/topic/notification-summary", email)
}
