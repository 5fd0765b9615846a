use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DocFlow CLI - Live notifications for the DocFlow document workflow
#[derive(Parser, Debug)]
#[command(name = "docflow")]
#[command(author = "DocFlow Team")]
#[command(version)]
#[command(about = "Watch DocFlow notifications from the terminal", long_about = None)]
pub struct Cli {
    /// API origin (e.g., https://api.docflow.edu); overrides the config file
    #[arg(short = 'u', long = "url", env = "DOCFLOW_URL")]
    pub url: Option<String>,

    /// Configuration file path
    #[arg(long = "config", default_value = "~/.docflow/config.toml")]
    pub config: PathBuf,

    /// Session file path (defaults to the platform config directory)
    #[arg(long = "session-file")]
    pub session_file: Option<PathBuf>,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a signed-in session obtained from the DocFlow login endpoint
    Login {
        /// JWT access token
        #[arg(long = "token", env = "DOCFLOW_TOKEN")]
        token: String,

        /// Account email; also names the user's notification destinations
        #[arg(long = "email")]
        email: String,

        /// Numeric user id
        #[arg(long = "id")]
        id: i64,

        /// STUDENT, ADVISOR or ADMIN
        #[arg(long = "role", default_value = "STUDENT")]
        role: String,

        /// Display name
        #[arg(long = "name")]
        name: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the stored session and the current notification summary
    Status,

    /// Stay connected and print notifications as they arrive (default)
    Watch,

    /// List notifications, newest first
    List {
        /// Zero-based page index
        #[arg(long = "page", default_value_t = 0)]
        page: u32,

        /// Page size
        #[arg(long = "size", default_value_t = 20)]
        size: u32,
    },

    /// Mark one notification, or all of them, as read
    Read {
        /// Notification id
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<i64>,

        /// Mark every notification as read
        #[arg(long = "all")]
        all: bool,
    },

    /// Publish a JSON message to a STOMP destination
    Send {
        /// Destination (e.g., /app/notifications/ack)
        destination: String,

        /// JSON body
        body: String,

        /// Seconds to wait for the connection
        #[arg(long = "wait", default_value_t = 10)]
        wait: u64,
    },
}
