//! Observable notification summary state.

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::NotificationSummary;

/// Snapshot published to store observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryState {
    /// `None` until a summary has been fetched or pushed.
    pub summary: Option<NotificationSummary>,
    pub is_loading: bool,
}

/// Holds the unread/total counters that drive badges.
///
/// Cheap to clone; clones share state. Every mutation notifies observers
/// obtained from [`subscribe`](Self::subscribe).
///
/// ```rust
/// use docflow_link::NotificationSummaryStore;
///
/// let store = NotificationSummaryStore::new();
/// store.increment_unread_count();
/// store.decrement_unread_count(5);
/// assert_eq!(store.unread_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct NotificationSummaryStore {
    state: Arc<watch::Sender<SummaryState>>,
}

impl Default for NotificationSummaryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSummaryStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SummaryState::default());
        Self { state: Arc::new(tx) }
    }

    /// Replace the aggregate and clear the loading flag.
    pub fn set_summary(&self, summary: NotificationSummary) {
        self.state.send_replace(SummaryState {
            summary: Some(summary),
            is_loading: false,
        });
    }

    /// One more unread notification. Without a prior summary this seeds
    /// unread = total = 1.
    pub fn increment_unread_count(&self) {
        self.state.send_modify(|state| match state.summary.as_mut() {
            Some(summary) => summary.unread_count = summary.unread_count.saturating_add(1),
            None => state.summary = Some(NotificationSummary::first_unread()),
        });
    }

    /// Subtract `count`, floored at zero. No-op without a summary.
    pub fn decrement_unread_count(&self, count: u64) {
        self.state.send_if_modified(|state| match state.summary.as_mut() {
            Some(summary) => {
                summary.unread_count = summary.unread_count.saturating_sub(count);
                true
            },
            None => false,
        });
    }

    pub fn clear_unread_count(&self) {
        self.state.send_if_modified(|state| match state.summary.as_mut() {
            Some(summary) => {
                summary.unread_count = 0;
                true
            },
            None => false,
        });
    }

    pub fn set_is_loading(&self, loading: bool) {
        self.state.send_modify(|state| state.is_loading = loading);
    }

    pub fn summary(&self) -> Option<NotificationSummary> {
        self.state.borrow().summary
    }

    pub fn unread_count(&self) -> u64 {
        self.state.borrow().summary.map(|s| s.unread_count).unwrap_or(0)
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn snapshot(&self) -> SummaryState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SummaryState> {
        self.state.subscribe()
    }

    /// Back to the initial empty state, e.g. on logout.
    pub fn reset(&self) {
        self.state.send_replace(SummaryState::default());
    }
}
