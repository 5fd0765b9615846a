//! REST calls for the notification summary and list.
//!
//! The summary store is seeded over HTTP and then kept current by pushes;
//! these calls also apply the local counter changes that follow a
//! successful mark-as-read.

use log::{debug, warn};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Instant;

use crate::auth::SessionStore;
use crate::error::{LinkError, Result};
use crate::models::{Notification, NotificationSummary, Page};
use crate::store::NotificationSummaryStore;
use crate::timeouts::LinkTimeouts;

/// Thin client for the `/notifications` endpoints.
///
/// # Examples
///
/// ```rust,no_run
/// use docflow_link::{auth::SessionStore, LinkTimeouts, NotificationApi, NotificationSummaryStore};
///
/// # async fn example() -> docflow_link::Result<()> {
/// let session = SessionStore::new();
/// let store = NotificationSummaryStore::new();
/// let api = NotificationApi::new("https://api.docflow.edu", session, &LinkTimeouts::default())?;
///
/// api.refresh_summary(&store).await?;
/// let page = api.list(0, 20).await?;
/// for n in &page.content {
///     println!("{}: {}", n.id, n.title);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct NotificationApi {
    base_url: String,
    http_client: reqwest::Client,
    session: SessionStore,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl NotificationApi {
    pub fn new(
        base_url: impl Into<String>,
        session: SessionStore,
        timeouts: &LinkTimeouts,
    ) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(LinkError::ConfigurationError("base_url is required".into()));
        }
        let mut builder = reqwest::Client::builder().pool_max_idle_per_host(4);
        if !LinkTimeouts::is_no_timeout(timeouts.request_timeout) {
            builder = builder.timeout(timeouts.request_timeout);
        }
        if !LinkTimeouts::is_no_timeout(timeouts.connection_timeout) {
            builder = builder.connect_timeout(timeouts.connection_timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| LinkError::ConfigurationError(e.to_string()))?;
        Ok(Self {
            base_url,
            http_client,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /notifications/summary`
    pub async fn fetch_summary(&self) -> Result<NotificationSummary> {
        self.request_json(Method::GET, "/notifications/summary").await
    }

    /// Fetch the summary into `store`, flagging it as loading meanwhile.
    pub async fn refresh_summary(&self, store: &NotificationSummaryStore) -> Result<NotificationSummary> {
        store.set_is_loading(true);
        match self.fetch_summary().await {
            Ok(summary) => {
                store.set_summary(summary);
                Ok(summary)
            },
            Err(e) => {
                store.set_is_loading(false);
                Err(e)
            },
        }
    }

    /// `GET /notifications?page=&size=`
    pub async fn list(&self, page: u32, size: u32) -> Result<Page<Notification>> {
        self.request_json(Method::GET, &format!("/notifications?page={}&size={}", page, size))
            .await
    }

    /// `PUT /notifications/{id}/read`, then one less unread in `store`.
    pub async fn mark_as_read(&self, id: i64, store: &NotificationSummaryStore) -> Result<()> {
        self.request(Method::PUT, &format!("/notifications/{}/read", id)).await?;
        store.decrement_unread_count(1);
        Ok(())
    }

    /// `PUT /notifications/read-all`, then zero unread in `store`.
    pub async fn mark_all_as_read(&self, store: &NotificationSummaryStore) -> Result<()> {
        self.request(Method::PUT, "/notifications/read-all").await?;
        store.clear_unread_count();
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request_json<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T> {
        let response = self.request(method, path).await?;
        Ok(response.json::<T>().await?)
    }

    async fn request(&self, method: Method, path: &str) -> Result<reqwest::Response> {
        let url = self.endpoint(path);
        let mut builder = self.http_client.request(method.clone(), &url);
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }

        let start = Instant::now();
        debug!("[docflow-link] {} {}", method, url);
        let response = builder.send().await?;
        let status = response.status();
        debug!(
            "[docflow-link] {} {} -> {} in {:?}",
            method,
            url,
            status,
            start.elapsed()
        );
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let err = error_for_status(status, &body);
        warn!("[docflow-link] {} {} failed: {}", method, url, err);
        Err(err)
    }
}

fn error_for_status(status: StatusCode, body: &str) -> LinkError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("Unknown error").to_string()
            } else {
                trimmed.to_string()
            }
        });
    if status == StatusCode::UNAUTHORIZED {
        LinkError::AuthenticationError(message)
    } else {
        LinkError::ServerError {
            status_code: status.as_u16(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> NotificationApi {
        NotificationApi::new(base, SessionStore::new(), &LinkTimeouts::default()).unwrap()
    }

    #[test]
    fn test_endpoint_building() {
        let api = api("https://api.docflow.edu/api/");
        assert_eq!(api.base_url(), "https://api.docflow.edu/api");
        assert_eq!(
            api.endpoint("/notifications/summary"),
            "https://api.docflow.edu/api/notifications/summary"
        );
        assert_eq!(
            api.endpoint(&format!("/notifications/{}/read", 12)),
            "https://api.docflow.edu/api/notifications/12/read"
        );
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let result = NotificationApi::new("  ", SessionStore::new(), &LinkTimeouts::default());
        assert!(matches!(result, Err(LinkError::ConfigurationError(_))));
    }

    #[test]
    fn test_unauthorized_maps_to_auth_error() {
        let err = error_for_status(StatusCode::UNAUTHORIZED, r#"{"message":"JWT expired"}"#);
        match err {
            LinkError::AuthenticationError(msg) => assert_eq!(msg, "JWT expired"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_server_error_message_extraction() {
        match error_for_status(StatusCode::NOT_FOUND, r#"{"error":"Notification not found"}"#) {
            LinkError::ServerError {
                status_code,
                message,
            } => {
                assert_eq!(status_code, 404);
                assert_eq!(message, "Notification not found");
            },
            other => panic!("unexpected {:?}", other),
        }

        match error_for_status(StatusCode::BAD_GATEWAY, "") {
            LinkError::ServerError { message, .. } => assert_eq!(message, "Bad Gateway"),
            other => panic!("unexpected {:?}", other),
        }

        match error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "stack trace\n") {
            LinkError::ServerError { message, .. } => assert_eq!(message, "stack trace"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
