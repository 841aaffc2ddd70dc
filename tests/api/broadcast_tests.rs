//! Broadcast and Shutdown Tests

use pretty_assertions::assert_eq;
use resource_broker::domain::{ConnectionSession, OutboundEnvelope};
use resource_broker::shared::BrokerError;
use serde_json::json;
use tokio::sync::mpsc;

use crate::common::{eventually, TestApp};

#[tokio::test]
async fn test_broadcast_reaches_every_connection() {
    let app = TestApp::spawn().await;
    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(app.connect_ready("/").await.0);
    }

    let report = app.service.broadcast(r#"{"handler":"ping"}"#, None).unwrap();
    assert_eq!(report.delivered, 3);
    assert_eq!(report.failed, 0);

    for client in &mut clients {
        assert_eq!(client.recv_text().await.as_deref(), Some(r#"{"handler":"ping"}"#));
    }
}

#[tokio::test]
async fn test_broadcast_envelope_is_serialized_once_for_all() {
    let app = TestApp::spawn().await;
    let (mut a, _) = app.connect_ready("/").await;
    let (mut b, _) = app.connect_ready("/").await;

    let envelope = OutboundEnvelope::Remove {
        resource: "nodes".into(),
        id: json!("42"),
        data: json!({ "id": "42" }),
    };
    app.service.broadcast_envelope(&envelope, None).unwrap();

    let first = a.recv_text().await.unwrap();
    let second = b.recv_text().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, envelope.to_json().unwrap());
}

#[tokio::test]
async fn test_broadcast_skip_predicate_excludes_connection() {
    let app = TestApp::spawn().await;
    let (mut skipped, skipped_id) = app.connect_ready("/").await;
    let (mut other, _) = app.connect_ready("/").await;

    let skip = move |session: &ConnectionSession| session.id() == skipped_id;
    let report = app.service.broadcast("first", Some(&skip)).unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(report.skipped, 1);

    app.service.broadcast("second", None).unwrap();

    assert_eq!(other.recv_text().await.as_deref(), Some("first"));
    assert_eq!(other.recv_text().await.as_deref(), Some("second"));
    assert_eq!(skipped.recv_text().await.as_deref(), Some("second"));
}

#[tokio::test]
async fn test_failed_delivery_closes_only_that_connection() {
    let app = TestApp::spawn().await;
    let (mut live, live_id) = app.connect_ready("/").await;

    let (tx, rx) = mpsc::channel(1);
    let dead = app.service.connect("/", tx);
    drop(rx);

    let report = app.service.broadcast("update", None).unwrap();
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failed, 1);

    assert_eq!(live.recv_text().await.as_deref(), Some("update"));
    assert!(app.service.session(dead.id()).is_none());
    assert!(app.service.session(live_id).is_some());
}

#[tokio::test]
async fn test_connection_that_stops_reading_is_dropped() {
    let app = TestApp::spawn().await;
    let (mut live, _) = app.connect_ready("/").await;

    // Registered but its queue is never drained
    let (tx, _stalled_rx) = mpsc::channel(4);
    let stalled = app.service.connect("/", tx);

    let payload = "x".repeat(64 * 1024);
    let mut failed = 0;
    for _ in 0..5 {
        failed += app.service.broadcast(payload.as_str(), None).unwrap().failed;
    }

    assert_eq!(failed, 1);
    assert!(app.service.session(stalled.id()).is_none());
    assert_eq!(live.recv_text().await.map(|text| text.len()), Some(payload.len()));
}

#[tokio::test]
async fn test_stop_closes_clients_and_disables_broadcast() {
    let app = TestApp::spawn().await;
    let (mut a, _) = app.connect_ready("/nodes").await;
    let (mut b, _) = app.connect_ready("/").await;

    a.send_json(json!({ "handler": "watch", "params": { "id": "1" } }))
        .await;
    a.recv_json().await;

    app.service.stop().await;

    a.expect_closed().await;
    b.expect_closed().await;
    assert_eq!(app.service.session_count(), 0);
    assert!(eventually(|| async { app.nodes.disposed() == 1 }).await);

    let err = app.service.broadcast("late", None).unwrap_err();
    assert!(matches!(err, BrokerError::BroadcastUnavailable));
}

#[tokio::test]
async fn test_stop_twice_is_harmless() {
    let app = TestApp::spawn().await;
    app.service.stop().await;
    app.service.stop().await;
    assert!(!app.service.is_running());
}
