//! `watch` and `send`: the commands that hold a live connection.

use colored::Colorize;
use docflow_cli::{surface, CLIError, Result};
use docflow_link::{ConnectionState, LinkError, NotificationSummaryStore};
use std::time::Duration;

use crate::connect::Context;

/// Stay connected until Ctrl+C, or until reconnection gives up.
pub async fn watch(ctx: &Context) -> Result<()> {
    let user = ctx.require_user()?;
    let summary = NotificationSummaryStore::new();
    let client = ctx.client(&summary)?;

    let badge = surface::spawn_badge_printer(&summary);
    println!(
        "Watching notifications for {} {}",
        user.display_name().bold(),
        "(Ctrl+C to stop)".dimmed()
    );

    let binding = client.bind_session(&ctx.session);
    if let Err(e) = client.api()?.refresh_summary(&summary).await {
        tracing::warn!("Could not load notification summary: {}", e);
    }

    let mut states = client.state_changes();
    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => signal.map_err(CLIError::from),
        Ok(_) = states.wait_for(|s| *s == ConnectionState::Failed) => {
            Err(CLIError::LinkError(LinkError::NetworkError(
                "Gave up reconnecting. Run the command again to retry".to_string(),
            )))
        }
    };

    binding.abort();
    client.shutdown().await;
    badge.abort();
    outcome
}

/// Connect, publish one JSON message and disconnect.
pub async fn send(ctx: &Context, destination: &str, body: &str, wait: u64) -> Result<()> {
    ctx.require_user()?;
    let payload: serde_json::Value = serde_json::from_str(body)?;

    let client = ctx.client(&NotificationSummaryStore::new())?;
    client.connect().await?;

    let mut states = client.state_changes();
    let reached = tokio::time::timeout(Duration::from_secs(wait), async {
        states
            .wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Failed))
            .await
            .map(|s| *s)
    })
    .await;

    let result = match reached {
        Ok(Ok(ConnectionState::Connected)) => client.send_message(destination, &payload).await,
        Ok(_) => Err(LinkError::NetworkError("Could not connect".to_string())),
        Err(_) => Err(LinkError::TimeoutError(format!("Not connected after {}s", wait))),
    };

    client.shutdown().await;
    result?;
    println!("Sent to {}", destination.bold());
    Ok(())
}
