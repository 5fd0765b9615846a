//! DocFlow CLI - Terminal client for DocFlow notifications
//!
//! # Usage
//!
//! ```bash
//! # Store the session returned by the login endpoint
//! docflow login --email ana@uni.edu --id 7 --role STUDENT --token <JWT>
//!
//! # Follow notifications live (default command)
//! docflow -u https://api.docflow.edu
//!
//! # Browse and acknowledge
//! docflow list --page 0 --size 20
//! docflow read --all
//! ```

use clap::Parser;
use colored::Colorize;

use docflow_cli::{logging, CLIConfiguration, Result};

mod args;
mod commands;
mod connect;

use args::{Cli, Command};
use commands::{notifications, session, watch};
use connect::Context;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = CLIConfiguration::load(&cli.config)?;
    let color = !cli.no_color && config.resolved_ui().color;
    if !color {
        colored::control::set_override(false);
    }
    logging::init_logging(cli.verbose, color)?;

    let ctx = Context::open(&cli, config)?;

    match cli.command.unwrap_or(Command::Watch) {
        Command::Login {
            token,
            email,
            id,
            role,
            name,
        } => session::login(&ctx, token, email, id, &role, name),
        Command::Logout => session::logout(&ctx),
        Command::Status => session::status(&ctx).await,
        Command::Watch => watch::watch(&ctx).await,
        Command::List { page, size } => notifications::list(&ctx, page, size).await,
        Command::Read { id, all } => notifications::read(&ctx, id, all).await,
        Command::Send {
            destination,
            body,
            wait,
        } => watch::send(&ctx, &destination, &body, wait).await,
    }
}
