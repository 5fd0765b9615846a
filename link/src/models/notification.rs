use serde::{Deserialize, Serialize};

/// Category of a pushed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Document,
    Comment,
    Approval,
    System,
    #[serde(other)]
    Other,
}

/// Urgency of a notification. `Urgent` drives the summary's `has_urgent` flag
/// on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
    #[serde(other)]
    Unknown,
}

/// A single notification as pushed on `/user/{email}/topic/notifications`
/// and returned by the notifications REST endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,

    #[serde(rename = "type")]
    pub notification_type: NotificationType,

    pub title: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub priority: NotificationPriority,

    #[serde(default)]
    pub read: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,

    /// ISO-8601 timestamp as sent by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Notification {
    pub fn is_urgent(&self) -> bool {
        self.priority == NotificationPriority::Urgent
    }
}
