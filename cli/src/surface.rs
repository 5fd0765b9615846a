//! Terminal presentation of notification activity.
//!
//! Renders the same signals a browser shell would show: a toast per pushed
//! notification, an unread badge whenever the summary changes, and a
//! connectivity line on every state transition.

use colored::{ColoredString, Colorize};
use docflow_link::{
    ConnectionState, EventHandlers, Notification, NotificationPriority, NotificationSummaryStore,
    SummaryState,
};
use tokio::task::JoinHandle;

/// Toast line for a pushed notification.
pub fn format_toast(notification: &Notification) -> String {
    let tag = match notification.priority {
        NotificationPriority::Urgent => "URGENT".red().bold(),
        NotificationPriority::High => "HIGH".yellow().bold(),
        _ => "NEW".cyan(),
    };

    let mut line = format!("[{}] {}", tag, notification.title.bold());
    if !notification.message.is_empty() {
        line.push_str(": ");
        line.push_str(&notification.message);
    }
    if let Some(document_id) = notification.document_id {
        line.push_str(&format!(" {}", format!("(document #{})", document_id).dimmed()));
    }
    line
}

/// One line of `docflow list` output.
pub fn format_row(notification: &Notification) -> String {
    let marker = if notification.read {
        " ".normal()
    } else {
        "●".cyan()
    };
    let created = notification.created_at.as_deref().unwrap_or("");
    format!(
        "{} {:>6}  {}  {}",
        marker,
        notification.id,
        notification.title,
        created.dimmed()
    )
}

/// Badge line for the current summary.
pub fn format_badge(state: &SummaryState) -> String {
    if state.is_loading && state.summary.is_none() {
        return "Unread: ...".dimmed().to_string();
    }

    let Some(summary) = state.summary else {
        return "Unread: -".dimmed().to_string();
    };

    let count = if summary.unread_count > 99 {
        "99+".to_string()
    } else {
        summary.unread_count.to_string()
    };
    let count = if summary.has_urgent {
        count.red().bold()
    } else if summary.unread_count > 0 {
        count.yellow().bold()
    } else {
        count.normal()
    };

    format!(
        "Unread: {} of {} (documents {}, comments {}, approvals {})",
        count,
        summary.total_count,
        summary.documents_count,
        summary.comments_count,
        summary.approvals_count
    )
}

pub fn format_state(state: ConnectionState) -> ColoredString {
    let label = format!("● {}", state);
    match state {
        ConnectionState::Connected => label.green(),
        ConnectionState::Connecting | ConnectionState::Reconnecting => label.yellow(),
        ConnectionState::Failed => label.red().bold(),
        ConnectionState::Disconnected => label.dimmed(),
    }
}

/// Event handlers that print connectivity changes and toasts.
pub fn event_handlers() -> EventHandlers {
    EventHandlers::new()
        .on_state_change(|state| eprintln!("{}", format_state(state)))
        .on_reconnect(|| println!("{}", "Connection restored".green()))
        .on_disconnect(|reason| tracing::info!("Disconnected: {}", reason))
        .on_error(|err| {
            if err.recoverable {
                tracing::warn!("{}", err);
            } else {
                eprintln!("{} {}", "Error:".red().bold(), err);
            }
        })
        .on_notification(|n| println!("{}", format_toast(n)))
}

/// Print the badge every time the summary store changes.
pub fn spawn_badge_printer(store: &NotificationSummaryStore) -> JoinHandle<()> {
    let mut updates = store.subscribe();
    tokio::spawn(async move {
        let mut last = None;
        while updates.changed().await.is_ok() {
            let line = format_badge(&updates.borrow_and_update());
            if last.as_ref() != Some(&line) {
                println!("{}", line);
                last = Some(line);
            }
        }
    })
}
