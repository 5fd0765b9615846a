//! `list` and `read`.

use colored::Colorize;
use docflow_cli::{surface, Result};
use docflow_link::NotificationSummaryStore;

use crate::connect::Context;

pub async fn list(ctx: &Context, page: u32, size: u32) -> Result<()> {
    ctx.require_user()?;

    let result = ctx.api()?.list(page, size).await?;
    if result.content.is_empty() {
        println!("{}", "No notifications".dimmed());
        return Ok(());
    }

    for notification in &result.content {
        println!("{}", surface::format_row(notification));
    }
    println!(
        "{}",
        format!(
            "Page {} of {} ({} total)",
            result.number + 1,
            result.total_pages.max(1),
            result.total_elements
        )
        .dimmed()
    );
    Ok(())
}

pub async fn read(ctx: &Context, id: Option<i64>, all: bool) -> Result<()> {
    ctx.require_user()?;

    let api = ctx.api()?;
    let summary = NotificationSummaryStore::new();
    if let Err(e) = api.refresh_summary(&summary).await {
        tracing::debug!("Summary not loaded before marking as read: {}", e);
    }

    match id {
        Some(id) if !all => {
            api.mark_as_read(id, &summary).await?;
            println!("Marked notification {} as read", id);
        },
        _ => {
            api.mark_all_as_read(&summary).await?;
            println!("Marked all notifications as read");
        },
    }

    if summary.summary().is_some() {
        println!("{}", surface::format_badge(&summary.snapshot()));
    }
    Ok(())
}
