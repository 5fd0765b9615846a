//! Subscription replay, message routing and publishing against the
//! scripted transport.

use docflow_link::auth::{Role, User};
use docflow_link::stomp::{Command, Frame};
use docflow_link::{
    notifications_destination, summary_destination, ConnectionOptions, ConnectionState,
    EventHandlers, LinkError, Notification, NotificationSummary, NotificationSummaryStore,
    SessionStore,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

mod common;
use common::*;

fn subscribed_destinations(frames: &[Frame]) -> Vec<String> {
    let mut destinations: Vec<String> = frames
        .iter()
        .filter_map(|f| f.destination().map(str::to_string))
        .collect();
    destinations.sort();
    destinations
}

#[tokio::test(start_paused = true)]
async fn early_subscriptions_replayed_exactly_once() {
    let transport = MockTransport::accepting();
    let client = default_client(transport.clone());

    let _doc = client.subscribe("/topic/documents/42", |_| {}).await.unwrap();
    let _doc_again = client.subscribe("/topic/documents/42", |_| {}).await.unwrap();
    assert!(transport.sent(Command::Subscribe).is_empty());

    client.connect().await.unwrap();
    wait_for_state(&client, ConnectionState::Connected).await;

    let mut expected = vec![
        "/topic/documents/42".to_string(),
        notifications_destination(EMAIL),
        summary_destination(EMAIL),
    ];
    expected.sort();
    assert_eq!(subscribed_destinations(&transport.sent_on(0, Command::Subscribe)), expected);

    transport.break_session(LinkError::WebSocketError("reset".into()));
    wait_for_state(&client, ConnectionState::Reconnecting).await;
    wait_for_state(&client, ConnectionState::Connected).await;

    assert_eq!(subscribed_destinations(&transport.sent_on(1, Command::Subscribe)), expected);
    assert_eq!(transport.sent(Command::Subscribe).len(), 6);
}

#[tokio::test(start_paused = true)]
async fn subscribe_while_connected_is_sent_immediately() {
    let transport = MockTransport::accepting();
    let client = default_client(transport.clone());
    client.connect().await.unwrap();
    wait_for_state(&client, ConnectionState::Connected).await;

    let first = client.subscribe("/topic/documents/9", |_| {}).await.unwrap();
    let second = client.subscribe("/topic/documents/9", |_| {}).await.unwrap();
    let subs: Vec<Frame> = transport
        .sent(Command::Subscribe)
        .into_iter()
        .filter(|f| f.destination() == Some("/topic/documents/9"))
        .collect();
    assert_eq!(subs.len(), 1);
    let id = subs[0].get_header("id").unwrap().to_string();

    first.unsubscribe().await.unwrap();
    settle().await;
    assert!(transport.sent(Command::Unsubscribe).is_empty());

    second.unsubscribe().await.unwrap();
    settle().await;
    let unsubs = transport.sent(Command::Unsubscribe);
    assert_eq!(unsubs.len(), 1);
    assert_eq!(unsubs[0].get_header("id"), Some(id.as_str()));
}

#[tokio::test(start_paused = true)]
async fn pushed_notifications_update_store() {
    let transport = MockTransport::accepting();
    let summary = NotificationSummaryStore::new();
    let received: Arc<Mutex<Vec<Notification>>> = Arc::new(Mutex::new(Vec::new()));
    let handlers = EventHandlers::new().on_notification({
        let received = received.clone();
        move |n| received.lock().unwrap().push(n.clone())
    });
    let client = build_client(
        transport.clone(),
        signed_in_session(),
        summary.clone(),
        handlers,
        ConnectionOptions::default(),
    );
    client.connect().await.unwrap();
    wait_for_state(&client, ConnectionState::Connected).await;

    let notification = json!({
        "id": 101,
        "type": "APPROVAL",
        "title": "Thesis approved",
        "message": "Your advisor approved chapter 3",
        "priority": "URGENT",
        "read": false,
        "documentId": 42
    });
    transport.deliver(message(&notifications_destination(EMAIL), &notification.to_string()));
    settle().await;

    assert_eq!(summary.unread_count(), 1);
    assert_eq!(summary.summary(), Some(NotificationSummary::first_unread()));
    {
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].title, "Thesis approved");
        assert!(received[0].is_urgent());
    }

    let pushed = json!({
        "unreadCount": 4,
        "totalCount": 10,
        "hasUrgent": true,
        "documentsCount": 1,
        "commentsCount": 2,
        "approvalsCount": 1
    });
    transport.deliver(message(&summary_destination(EMAIL), &pushed.to_string()));
    settle().await;
    assert_eq!(summary.unread_count(), 4);
    assert_eq!(summary.summary().unwrap().total_count, 10);

    transport.deliver(message(&notifications_destination(EMAIL), "{not json"));
    transport.deliver(message(&summary_destination(EMAIL), "not-a-summary"));
    settle().await;
    assert_eq!(summary.unread_count(), 4);
    assert_eq!(received.lock().unwrap().len(), 1);
    assert_eq!(client.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn every_handler_of_a_destination_runs_once() {
    let transport = MockTransport::accepting();
    let client = default_client(transport.clone());
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let hits = hits.clone();
        client
            .subscribe("/topic/documents/5/comments", move |frame| {
                assert_eq!(frame.body, "{\"commentId\":1}");
                hits.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
    }
    client.connect().await.unwrap();
    wait_for_state(&client, ConnectionState::Connected).await;

    transport.deliver(message("/topic/documents/5/comments", "{\"commentId\":1}"));
    transport.deliver(message("/topic/documents/6/comments", "{\"commentId\":2}"));
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn disconnect_clears_subscriptions() {
    let transport = MockTransport::accepting();
    let client = default_client(transport.clone());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    client
        .subscribe("/topic/documents/1", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();
    client.connect().await.unwrap();
    wait_for_state(&client, ConnectionState::Connected).await;

    client.disconnect().await.unwrap();
    assert_eq!(transport.closed_sessions(), 1);
    assert_eq!(transport.sent_on(0, Command::Disconnect).len(), 1);

    client.connect().await.unwrap();
    wait_for_state(&client, ConnectionState::Connected).await;
    let replayed = subscribed_destinations(&transport.sent_on(1, Command::Subscribe));
    assert_eq!(replayed.len(), 2);
    assert!(!replayed.contains(&"/topic/documents/1".to_string()));

    transport.deliver(message("/topic/documents/1", "{}"));
    settle().await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn send_message_only_when_connected() {
    let transport = MockTransport::accepting();
    let client = default_client(transport.clone());

    client
        .send_message("/app/documents/42/typing", &json!({"typing": true}))
        .await
        .unwrap();
    assert!(transport.sent(Command::Send).is_empty());

    client.connect().await.unwrap();
    wait_for_state(&client, ConnectionState::Connected).await;
    client
        .send_message("/app/documents/42/typing", &json!({"typing": false}))
        .await
        .unwrap();

    let sent = transport.sent(Command::Send);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].destination(), Some("/app/documents/42/typing"));
    assert_eq!(sent[0].get_header("content-type"), Some("application/json"));
    assert_eq!(sent[0].body, r#"{"typing":false}"#);
}

#[tokio::test(start_paused = true)]
async fn connect_without_session_does_nothing() {
    let transport = MockTransport::accepting();
    let client = build_client(
        transport.clone(),
        SessionStore::new(),
        NotificationSummaryStore::new(),
        EventHandlers::new(),
        ConnectionOptions::default(),
    );
    client.connect().await.unwrap();
    settle().await;
    assert_eq!(transport.connect_count(), 0);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn bound_session_drives_connection() {
    let transport = MockTransport::accepting();
    let session = SessionStore::new();
    let client = build_client(
        transport.clone(),
        session.clone(),
        NotificationSummaryStore::new(),
        EventHandlers::new(),
        ConnectionOptions::default(),
    );
    let _watcher = client.bind_session(&session);
    settle().await;
    assert_eq!(transport.connect_count(), 0);

    session
        .set_auth(User::new(3, "li@uni.edu", Role::Advisor), "jwt-li")
        .unwrap();
    wait_for_state(&client, ConnectionState::Connected).await;
    assert_eq!(transport.last_request().unwrap().token.as_deref(), Some("jwt-li"));
    assert!(transport
        .sent(Command::Subscribe)
        .iter()
        .any(|f| f.destination() == Some("/user/li@uni.edu/topic/notifications")));

    session.clear_auth().unwrap();
    wait_for_state(&client, ConnectionState::Disconnected).await;
    assert_eq!(transport.closed_sessions(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_session() {
    let transport = MockTransport::accepting();
    let client = default_client(transport.clone());
    client.connect().await.unwrap();
    wait_for_state(&client, ConnectionState::Connected).await;

    client.shutdown().await;
    assert_eq!(transport.closed_sessions(), 1);
}
