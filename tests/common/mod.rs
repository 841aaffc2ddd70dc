//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{body::Body, http::Request, Router};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use resource_broker::application::ConnectionService;
use resource_broker::config::Settings;
use resource_broker::domain::{
    ConnectionId, Resource, ResourceCall, ResourceError, ResourceResult, ResourceTable, Verb,
    WatcherHandle,
};
use resource_broker::presentation::http::routes;
use resource_broker::startup::AppState;

/// How long a test waits for a frame that should arrive
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a test waits to be sure a frame does not arrive
pub const QUIET_PERIOD: Duration = Duration::from_millis(150);

/// Test resource answering `get`, `query`, `watch` and `stop`.
#[derive(Default)]
pub struct Nodes {
    watches: AtomicUsize,
    disposed: Arc<AtomicUsize>,
}

impl Nodes {
    pub fn watches(&self) -> usize {
        self.watches.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

fn reply_failed(e: resource_broker::shared::BrokerError) -> ResourceError {
    ResourceError::Other(e.into())
}

#[async_trait]
impl Resource for Nodes {
    fn verbs(&self) -> &[Verb] {
        &[Verb::Get, Verb::Query, Verb::Watch, Verb::Stop]
    }

    async fn get(&self, call: ResourceCall) -> ResourceResult {
        let id = call
            .envelope
            .params
            .get("id")
            .cloned()
            .ok_or_else(|| ResourceError::BadRequest("missing id".into()))?;
        call.session
            .send_item(call.resource, id.clone(), json!({ "id": id }))
            .map_err(reply_failed)
    }

    async fn query(&self, call: ResourceCall) -> ResourceResult {
        call.session
            .send_list(call.resource, vec![json!({ "id": "1" }), json!({ "id": "2" })])
            .map_err(reply_failed)
    }

    async fn watch(&self, call: ResourceCall) -> ResourceResult {
        self.watches.fetch_add(1, Ordering::SeqCst);
        let disposed = Arc::clone(&self.disposed);
        call.session.add_watcher(
            &call.envelope.params,
            WatcherHandle::shared(move || {
                disposed.fetch_add(1, Ordering::SeqCst);
            }),
        );
        call.session
            .send_item(call.resource, "watching", call.envelope.params)
            .map_err(reply_failed)
    }

    async fn stop(&self, call: ResourceCall) -> ResourceResult {
        if call.session.remove_watchers(&call.envelope.params) {
            Ok(())
        } else {
            Err(ResourceError::NotFound("no watcher for params".into()))
        }
    }
}

/// Running broker bound to an ephemeral local port
pub struct TestApp {
    pub addr: SocketAddr,
    pub service: Arc<ConnectionService>,
    pub nodes: Arc<Nodes>,
}

impl TestApp {
    /// Start a broker serving the `nodes` resource
    pub async fn spawn() -> Self {
        let nodes = Arc::new(Nodes::default());
        let mut resources = ResourceTable::new();
        resources.insert("nodes", Arc::clone(&nodes) as Arc<dyn Resource>);

        let mut settings = Settings::default();
        settings.server.host = "127.0.0.1".into();
        settings.server.port = 0;

        let service = Arc::new(ConnectionService::new(settings, resources));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = service.start_with_listener(listener).unwrap();

        Self {
            addr,
            service,
            nodes,
        }
    }

    /// Open a WebSocket connection on `path`
    pub async fn connect(&self, path: &str) -> TestClient {
        let url = format!("ws://{}{}", self.addr, path);
        let (stream, _) = connect_async(url).await.unwrap();
        TestClient { stream }
    }

    /// Open a connection and complete the `init` exchange
    pub async fn connect_ready(&self, path: &str) -> (TestClient, ConnectionId) {
        let mut client = self.connect(path).await;
        let id = client.init().await;
        (client, id)
    }

    /// Router wired to the running service, for plain HTTP requests
    pub fn router(&self) -> Router {
        routes::create_router(AppState {
            service: Arc::clone(&self.service),
            settings: Arc::new(self.service.settings().clone()),
        })
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> axum::response::Response {
        self.router()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

/// WebSocket client speaking the envelope protocol
pub struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    pub async fn send_text(&mut self, text: &str) {
        self.stream.send(Message::text(text.to_owned())).await.unwrap();
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    /// Next text frame, or `None` if the connection ended first
    pub async fn recv_text(&mut self) -> Option<String> {
        let next = tokio::time::timeout(RECV_TIMEOUT, async {
            while let Some(msg) = self.stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
                    Ok(Message::Close(_)) | Err(_) => return None,
                    Ok(_) => continue,
                }
            }
            None
        })
        .await;
        next.expect("timed out waiting for a frame")
    }

    pub async fn recv_json(&mut self) -> Value {
        let text = self.recv_text().await.expect("connection closed");
        serde_json::from_str(&text).unwrap()
    }

    /// Assert nothing arrives for a short while
    pub async fn expect_silence(&mut self) {
        let next = tokio::time::timeout(QUIET_PERIOD, self.stream.next()).await;
        assert!(next.is_err(), "unexpected frame: {:?}", next);
    }

    /// Send `init` and return the identity from the `session` reply
    pub async fn init(&mut self) -> ConnectionId {
        self.send_json(json!({ "handler": "init" })).await;
        let reply = self.recv_json().await;
        assert_eq!(reply["handler"], "session");
        reply["id"].as_str().unwrap().parse().unwrap()
    }

    /// Wait until the server ends the connection
    pub async fn expect_closed(&mut self) {
        let ended = tokio::time::timeout(RECV_TIMEOUT, async {
            loop {
                match self.stream.next().await {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await;
        assert!(ended.is_ok(), "connection was not closed");
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Poll `condition` until it holds or the receive timeout passes
pub async fn eventually<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
