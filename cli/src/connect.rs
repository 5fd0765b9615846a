use colored::Colorize;
use docflow_cli::{surface, CLIConfiguration, CLIError, FileStorage, Result};
use docflow_link::{
    LinkError, LinkTimeouts, NotificationApi, NotificationClient, NotificationSummaryStore,
    SessionStore, User,
};
use std::sync::Arc;

use crate::args::Cli;

/// Everything a command needs: resolved configuration, API origin and the
/// persisted session.
pub struct Context {
    pub config: CLIConfiguration,
    pub base_url: String,
    pub session: SessionStore,
}

impl Context {
    pub fn open(cli: &Cli, config: CLIConfiguration) -> Result<Self> {
        let storage = match &cli.session_file {
            Some(path) => FileStorage::with_path(path.clone()),
            None => FileStorage::new(),
        }
        .map_err(|e| CLIError::ConfigurationError(format!("Failed to load session: {}", e)))?;
        tracing::debug!("Session file: {}", storage.path().display());

        let session = SessionStore::init(Arc::new(storage))?;
        let base_url = config.server_url(cli.url.as_deref());

        Ok(Self {
            config,
            base_url,
            session,
        })
    }

    /// The signed-in user, or an error telling how to sign in.
    pub fn require_user(&self) -> Result<User> {
        match self.session.user() {
            Some(user) if self.session.is_authenticated() => Ok(user),
            _ => Err(LinkError::AuthenticationError(format!(
                "not signed in. Run {} first",
                "docflow login".bold()
            ))
            .into()),
        }
    }

    pub fn api(&self) -> Result<NotificationApi> {
        Ok(NotificationApi::new(
            self.base_url.clone(),
            self.session.clone(),
            &LinkTimeouts::default(),
        )?)
    }

    /// Notification client wired to this session and the terminal surface.
    pub fn client(&self, summary: &NotificationSummaryStore) -> Result<NotificationClient> {
        let client = NotificationClient::builder()
            .base_url(self.base_url.clone())
            .session_store(self.session.clone())
            .summary_store(summary.clone())
            .connection_options(self.config.to_connection_options())
            .event_handlers(surface::event_handlers())
            .build()?;
        Ok(client)
    }
}
