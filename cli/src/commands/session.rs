//! `login`, `logout` and `status`.

use colored::Colorize;
use docflow_cli::{surface, Result};
use docflow_link::{NotificationSummaryStore, Role, User};

use crate::connect::Context;

pub fn login(
    ctx: &Context,
    token: String,
    email: String,
    id: i64,
    role: &str,
    name: Option<String>,
) -> Result<()> {
    let role: Role = role.parse()?;
    let mut user = User::new(id, email, role);
    if let Some(name) = name {
        user = user.with_full_name(name);
    }

    ctx.session.set_auth(user.clone(), token)?;
    println!(
        "Signed in as {} ({})",
        user.display_name().bold(),
        user.role.to_string().cyan()
    );
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<()> {
    let was_signed_in = ctx.session.is_authenticated();
    ctx.session.clear_auth()?;
    if was_signed_in {
        println!("Signed out");
    } else {
        println!("{}", "No stored session".dimmed());
    }
    Ok(())
}

pub async fn status(ctx: &Context) -> Result<()> {
    println!("Server:  {}", ctx.base_url);

    let Ok(user) = ctx.require_user() else {
        println!("Session: {}", "signed out".yellow());
        return Ok(());
    };
    println!(
        "Session: {} <{}> {}",
        user.display_name().bold(),
        user.email,
        user.role.to_string().cyan()
    );

    let summary = NotificationSummaryStore::new();
    match ctx.api()?.refresh_summary(&summary).await {
        Ok(_) => println!("{}", surface::format_badge(&summary.snapshot())),
        Err(e) => println!("Summary: {} ({})", "unavailable".red(), e),
    }
    Ok(())
}
