//! REST client against a minimal in-process HTTP/1.1 server.

use docflow_link::auth::{Role, SessionStore, User};
use docflow_link::{
    LinkError, LinkTimeouts, NotificationApi, NotificationPriority, NotificationSummary,
    NotificationSummaryStore, NotificationType,
};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    authorization: Option<String>,
}

type Route = Arc<dyn Fn(&str, &str) -> (u16, String) + Send + Sync>;

async fn serve(route: Route) -> (String, Arc<Mutex<Vec<Seen>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let route = route.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let _ = answer(socket, route, log).await;
            });
        }
    });

    (base_url, seen)
}

async fn answer(mut socket: TcpStream, route: Route, log: Arc<Mutex<Vec<Seen>>>) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }

    let head = String::from_utf8_lossy(&buf).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or("").split_whitespace();
    let method = request_line.next().unwrap_or("").to_string();
    let path = request_line.next().unwrap_or("").to_string();
    let authorization = lines.find_map(|line| {
        line.split_once(':')
            .filter(|(name, _)| name.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.trim().to_string())
    });
    log.lock().unwrap().push(Seen {
        method: method.clone(),
        path: path.clone(),
        authorization,
    });

    let (status, body) = route(&method, &path);
    let reason = match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Internal Server Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

fn signed_in() -> SessionStore {
    let session = SessionStore::new();
    session
        .set_auth(User::new(7, "ana@uni.edu", Role::Student), "jwt-ana")
        .unwrap();
    session
}

fn api(base_url: &str, session: SessionStore) -> NotificationApi {
    NotificationApi::new(base_url, session, &LinkTimeouts::fast()).unwrap()
}

const SUMMARY_JSON: &str = r#"{"unreadCount":3,"totalCount":10,"hasUrgent":true,"documentsCount":1,"commentsCount":1,"approvalsCount":1}"#;

#[tokio::test]
async fn test_refresh_summary_fills_store_with_bearer_token() {
    let (base_url, seen) = serve(Arc::new(|method: &str, path: &str| match (method, path) {
        ("GET", "/notifications/summary") => (200, SUMMARY_JSON.to_string()),
        _ => (404, String::new()),
    }))
    .await;

    let store = NotificationSummaryStore::new();
    let summary = api(&base_url, signed_in()).refresh_summary(&store).await.unwrap();

    assert_eq!(summary.unread_count, 3);
    assert!(summary.has_urgent);
    assert_eq!(store.unread_count(), 3);
    assert!(!store.is_loading());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer jwt-ana"));
}

#[tokio::test]
async fn test_refresh_failure_clears_loading_and_keeps_summary() {
    let (base_url, _seen) = serve(Arc::new(|_: &str, _: &str| {
        (401, r#"{"message":"JWT expired"}"#.to_string())
    }))
    .await;

    let store = NotificationSummaryStore::new();
    store.set_summary(NotificationSummary {
        unread_count: 4,
        ..NotificationSummary::default()
    });

    let err = api(&base_url, signed_in()).refresh_summary(&store).await.unwrap_err();
    assert!(matches!(err, LinkError::AuthenticationError(ref m) if m == "JWT expired"));
    assert!(!store.is_loading());
    assert_eq!(store.unread_count(), 4);
}

#[tokio::test]
async fn test_mark_as_read_adjusts_counters() {
    let (base_url, seen) = serve(Arc::new(|method: &str, path: &str| match (method, path) {
        ("PUT", "/notifications/7/read") | ("PUT", "/notifications/read-all") => {
            (200, String::new())
        },
        ("PUT", _) => (404, r#"{"error":"Notification not found"}"#.to_string()),
        _ => (500, String::new()),
    }))
    .await;

    let store = NotificationSummaryStore::new();
    store.set_summary(NotificationSummary {
        unread_count: 3,
        total_count: 10,
        ..NotificationSummary::default()
    });
    let api = api(&base_url, signed_in());

    api.mark_as_read(7, &store).await.unwrap();
    assert_eq!(store.unread_count(), 2);

    match api.mark_as_read(99, &store).await {
        Err(LinkError::ServerError {
            status_code,
            message,
        }) => {
            assert_eq!(status_code, 404);
            assert_eq!(message, "Notification not found");
        },
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(store.unread_count(), 2);

    api.mark_all_as_read(&store).await.unwrap();
    assert_eq!(store.unread_count(), 0);
    assert_eq!(store.summary().map(|s| s.total_count), Some(10));

    let paths: Vec<String> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|s| format!("{} {}", s.method, s.path))
        .collect();
    assert_eq!(
        paths,
        vec![
            "PUT /notifications/7/read",
            "PUT /notifications/99/read",
            "PUT /notifications/read-all",
        ]
    );
}

#[tokio::test]
async fn test_list_parses_page() {
    let (base_url, seen) = serve(Arc::new(|method: &str, path: &str| match (method, path) {
        ("GET", "/notifications?page=1&size=2") => (
            200,
            r#"{
                "content": [{
                    "id": 5,
                    "type": "COMMENT",
                    "title": "New comment",
                    "message": "Your advisor left a comment",
                    "priority": "HIGH",
                    "read": false,
                    "documentId": 9,
                    "createdAt": "2026-10-01T10:00:00Z"
                }],
                "totalElements": 3,
                "totalPages": 2,
                "number": 1,
                "size": 2
            }"#
            .to_string(),
        ),
        _ => (404, String::new()),
    }))
    .await;

    let page = api(&base_url, SessionStore::new()).list(1, 2).await.unwrap();
    assert_eq!(page.total_elements, 3);
    assert!(page.is_last());
    assert_eq!(page.content.len(), 1);

    let notification = &page.content[0];
    assert_eq!(notification.notification_type, NotificationType::Comment);
    assert_eq!(notification.priority, NotificationPriority::High);
    assert_eq!(notification.document_id, Some(9));

    // No session, no Authorization header.
    assert_eq!(seen.lock().unwrap()[0].authorization, None);
}
