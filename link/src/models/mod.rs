//! Data models for docflow-link.
//!
//! Wire payloads pushed on the notification destinations, the paginated
//! REST shape, and client-side configuration/state types.

pub mod connection_options;
pub mod connection_state;
pub mod notification;
pub mod notification_summary;
pub mod page;


pub use connection_options::ConnectionOptions;
pub use connection_state::ConnectionState;
pub use notification::{Notification, NotificationPriority, NotificationType};
pub use notification_summary::NotificationSummary;
pub use page::Page;
