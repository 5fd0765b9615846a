use serde::{Deserialize, Serialize};

/// Aggregate notification counters shown by badges.
///
/// Pushed on `/user/{email}/topic/notification-summary` and returned by
/// `GET /notifications/summary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSummary {
    #[serde(default)]
    pub unread_count: u64,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub has_urgent: bool,
    #[serde(default)]
    pub documents_count: u64,
    #[serde(default)]
    pub comments_count: u64,
    #[serde(default)]
    pub approvals_count: u64,
}

impl NotificationSummary {
    /// Summary created by the first pushed notification when none was loaded.
    pub fn first_unread() -> Self {
        Self {
            unread_count: 1,
            total_count: 1,
            ..Self::default()
        }
    }
}
