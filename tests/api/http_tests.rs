//! Plain HTTP Tests
//!
//! Health, metrics and the banner served to non-upgrade requests.

use axum::body::to_bytes;
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use resource_broker::presentation::websocket::BANNER;
use serde_json::Value;

use crate::common::TestApp;

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_plain_get_returns_banner() {
    let app = TestApp::spawn().await;

    for uri in ["/", "/nodes", "/api/2.0/nodes?x=1"] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, BANNER);
    }
}

#[tokio::test]
async fn test_health_reports_connections_and_resources() {
    let app = TestApp::spawn().await;
    let (_client, _) = app.connect_ready("/").await;

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["active_connections"], 1);
    assert_eq!(json["resources"], serde_json::json!(["nodes"]));
}

#[tokio::test]
async fn test_health_unhealthy_after_stop() {
    let app = TestApp::spawn().await;
    app.service.stop().await;

    let response = app.get("/health").await;
    let json: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_exposes_broker_counters() {
    let app = TestApp::spawn().await;
    let (_client, _) = app.connect_ready("/").await;

    let response = app.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("resource_broker_"));
}
