//! WebSocket Protocol Tests
//!
//! Envelope routing, error isolation and watcher lifecycle over a live
//! connection.

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::common::{eventually, TestApp};

#[tokio::test]
async fn test_init_replies_with_registered_identity() {
    let app = TestApp::spawn().await;
    let (_client, id) = app.connect_ready("/").await;

    assert!(app.service.session(id).is_some());
    assert_eq!(app.service.session_count(), 1);
}

#[tokio::test]
async fn test_each_connection_gets_distinct_identity() {
    let app = TestApp::spawn().await;
    let (_a, first) = app.connect_ready("/").await;
    let (_b, second) = app.connect_ready("/").await;

    assert_ne!(first, second);
    assert_eq!(app.service.session_count(), 2);
}

#[tokio::test]
async fn test_malformed_payload_keeps_connection_open() {
    let app = TestApp::spawn().await;
    let mut client = app.connect("/").await;

    client.send_text("{not json").await;
    client.send_text("[1, 2, 3]").await;
    client.send_json(json!({ "resource": "nodes" })).await;

    let id = client.init().await;
    assert!(app.service.session(id).is_some());
}

#[tokio::test]
async fn test_unknown_handler_sends_nothing() {
    let app = TestApp::spawn().await;
    let (mut client, _) = app.connect_ready("/").await;

    client.send_json(json!({ "handler": "bogus", "resource": "nodes" })).await;
    client.expect_silence().await;
}

#[tokio::test]
async fn test_unknown_resource_sends_nothing_and_stays_open() {
    let app = TestApp::spawn().await;
    let (mut client, id) = app.connect_ready("/").await;

    client.send_json(json!({ "handler": "get", "resource": "missing" })).await;
    client.expect_silence().await;

    // Verb the resource does not answer
    client.send_json(json!({ "handler": "all", "resource": "nodes" })).await;
    client.expect_silence().await;

    assert_eq!(client.init().await, id);
}

#[tokio::test]
async fn test_root_path_without_resource_field_is_unknown() {
    let app = TestApp::spawn().await;
    let (mut client, _) = app.connect_ready("/").await;

    client.send_json(json!({ "handler": "query" })).await;
    client.expect_silence().await;
}

#[tokio::test]
async fn test_resource_resolved_from_request_path() {
    let app = TestApp::spawn().await;
    let mut client = app.connect("/api/2.0/nodes").await;

    client
        .send_json(json!({ "handler": "get", "params": { "id": "7" } }))
        .await;
    let reply = client.recv_json().await;

    assert_eq!(
        reply,
        json!({ "handler": "item", "resource": "nodes", "id": "7", "data": { "id": "7" } })
    );
}

#[tokio::test]
async fn test_explicit_resource_overrides_path() {
    let app = TestApp::spawn().await;
    let mut client = app.connect("/elsewhere").await;

    client
        .send_json(json!({ "handler": "query", "resource": "nodes" }))
        .await;
    let reply = client.recv_json().await;

    assert_eq!(reply["handler"], "list");
    assert_eq!(reply["resource"], "nodes");
    assert_eq!(reply["items"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_replies_follow_request_order() {
    let app = TestApp::spawn().await;
    let mut client = app.connect("/nodes").await;

    for id in ["1", "2", "3"] {
        client
            .send_json(json!({ "handler": "get", "params": { "id": id } }))
            .await;
    }
    for id in ["1", "2", "3"] {
        assert_eq!(client.recv_json().await["id"], id);
    }
}

#[tokio::test]
async fn test_stop_matches_watch_regardless_of_key_order() {
    let app = TestApp::spawn().await;
    let (mut client, id) = app.connect_ready("/nodes").await;

    client
        .send_json(json!({ "handler": "watch", "params": { "a": 1, "b": { "x": true, "y": null } } }))
        .await;
    assert_eq!(client.recv_json().await["id"], "watching");
    assert_eq!(app.nodes.watches(), 1);

    client
        .send_json(json!({ "handler": "stop", "params": { "b": { "y": null, "x": true }, "a": 1 } }))
        .await;

    assert!(eventually(|| async { app.nodes.disposed() == 1 }).await);
    let session = app.service.session(id).unwrap();
    assert!(session.watchers().is_empty());
}

#[tokio::test]
async fn test_stop_with_other_params_leaves_watcher_running() {
    let app = TestApp::spawn().await;
    let (mut client, id) = app.connect_ready("/nodes").await;

    client
        .send_json(json!({ "handler": "watch", "params": { "id": "1" } }))
        .await;
    client.recv_json().await;
    client
        .send_json(json!({ "handler": "stop", "params": { "id": "2" } }))
        .await;

    // Round trip so the stop has been handled
    client.init().await;
    assert_eq!(app.nodes.disposed(), 0);
    assert_eq!(app.service.session(id).unwrap().watchers().len(), 1);
}

#[tokio::test]
async fn test_client_close_disposes_every_watcher() {
    let app = TestApp::spawn().await;
    let (mut client, id) = app.connect_ready("/nodes").await;

    for n in 0..3 {
        client
            .send_json(json!({ "handler": "watch", "params": { "n": n } }))
            .await;
        client.recv_json().await;
    }
    client.close().await;

    assert!(eventually(|| async { app.nodes.disposed() == 3 }).await);
    assert!(app.service.session(id).is_none());
    assert_eq!(app.service.session_count(), 0);
}

#[tokio::test]
async fn test_client_error_report_is_absorbed() {
    let app = TestApp::spawn().await;
    let (mut client, id) = app.connect_ready("/").await;

    client
        .send_json(json!({ "handler": "error", "message": "render failed", "params": { "view": "nodes" } }))
        .await;
    client.expect_silence().await;
    assert_eq!(client.init().await, id);
}
