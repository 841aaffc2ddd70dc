//! Connection Service
//!
//! Top-level owner of the session registry, message router and broadcaster.
//! Wires transport events (connect, message, error, close) into them and
//! manages the lifetime of the listening acceptor.

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::domain::{ConnectionId, ConnectionSession, Frame, OutboundEnvelope, ResourceTable};
use crate::infrastructure::metrics;
use crate::presentation::http::routes;
use crate::presentation::websocket::{BroadcastReport, Broadcaster, MessageRouter, SessionRegistry, SkipFn};
use crate::shared::error::{BrokerError, BrokerResult};
use crate::startup::AppState;

/// How long `stop` waits for the acceptor task before aborting it
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Running acceptor
struct Acceptor {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// WebSocket connection service
pub struct ConnectionService {
    settings: Arc<Settings>,
    sessions: SessionRegistry,
    router: MessageRouter,
    broadcaster: Broadcaster,
    acceptor: Mutex<Option<Acceptor>>,
}

impl ConnectionService {
    pub fn new(settings: Settings, resources: ResourceTable) -> Self {
        Self::with_sessions(settings, resources, SessionRegistry::new())
    }

    /// Build the service around an existing session registry.
    pub fn with_sessions(settings: Settings, resources: ResourceTable, sessions: SessionRegistry) -> Self {
        Self {
            settings: Arc::new(settings),
            broadcaster: Broadcaster::new(sessions.clone()),
            router: MessageRouter::new(resources),
            sessions,
            acceptor: Mutex::new(None),
        }
    }

    /// Bind the configured address and start accepting connections.
    ///
    /// Resolves with the bound address once the listener is up.
    pub async fn start(self: &Arc<Self>) -> BrokerResult<SocketAddr> {
        tracing::info!("Creating WebSocketServer, and initializing WebSocketService...");

        let listener = async {
            let addr = self.settings.server.socket_addr().map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
            })?;
            TcpListener::bind(addr).await
        }
        .await
        .map_err(|e| {
            let err = BrokerError::Startup(e);
            self.report(&err);
            err
        })?;

        self.start_with_listener(listener)
    }

    /// Start accepting connections on an already bound listener.
    ///
    /// Calling this while already running keeps the running acceptor and
    /// returns its address.
    pub fn start_with_listener(self: &Arc<Self>, listener: TcpListener) -> BrokerResult<SocketAddr> {
        let mut acceptor = self.acceptor.lock();
        if let Some(running) = acceptor.as_ref() {
            tracing::warn!(addr = %running.local_addr, "WebSocketServer is already running");
            return Ok(running.local_addr);
        }

        let local_addr = listener.local_addr().map_err(|e| {
            let err = BrokerError::Startup(e);
            self.report(&err);
            err
        })?;

        let app = routes::create_router(AppState {
            service: Arc::clone(self),
            settings: Arc::clone(&self.settings),
        });
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                tracing::error!(error = %e, "WebSocketServer terminated with error");
            }
        });

        *acceptor = Some(Acceptor {
            local_addr,
            shutdown,
            task,
        });
        tracing::info!("WebSocketServer is listening on {}...", local_addr);
        Ok(local_addr)
    }

    /// Stop accepting connections and forcibly close the remaining ones.
    ///
    /// No-op when the service is not running.
    pub async fn stop(&self) {
        let Some(acceptor) = self.acceptor.lock().take() else {
            tracing::debug!("WebSocketService is not running");
            return;
        };
        tracing::info!("Stopping WebSocketService...");

        let mut closed = self.sessions.close_all();
        let _ = acceptor.shutdown.send(());

        let mut task = acceptor.task;
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "WebSocketServer task failed"),
            Err(_) => {
                tracing::warn!("WebSocketServer did not shut down in time, aborting");
                task.abort();
            }
        }

        // Upgrades already past the handshake may have registered meanwhile
        closed += self.sessions.close_all();
        tracing::info!(connections_closed = closed, "WebSocketService stopped");
    }

    pub fn is_running(&self) -> bool {
        self.acceptor.lock().is_some()
    }

    /// Address of the running acceptor
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.acceptor.lock().as_ref().map(|a| a.local_addr)
    }

    /// Send a pre-serialized payload to every connection not excluded by `skip`.
    pub fn broadcast(
        &self,
        payload: impl Into<Frame>,
        skip: Option<SkipFn<'_>>,
    ) -> BrokerResult<BroadcastReport> {
        if !self.is_running() {
            let err = BrokerError::BroadcastUnavailable;
            self.report(&err);
            return Err(err);
        }
        Ok(self.broadcaster.broadcast(payload, skip))
    }

    /// Serialize `envelope` once and broadcast it.
    pub fn broadcast_envelope(
        &self,
        envelope: &OutboundEnvelope,
        skip: Option<SkipFn<'_>>,
    ) -> BrokerResult<BroadcastReport> {
        let text = envelope.to_json()?;
        self.broadcast(text, skip)
    }

    /// Transport accepted a connection on `path`.
    ///
    /// A connection arriving while the service is not running is torn down
    /// straight away; its transport task sees the terminate signal at once.
    pub fn connect(&self, path: &str, tx: mpsc::Sender<Frame>) -> Arc<ConnectionSession> {
        let session = self.sessions.register(path, tx);
        if !self.is_running() {
            tracing::debug!(
                connection_id = %session.id(),
                "WebSocketService is not running, closing connection"
            );
            self.sessions.close(session.id());
        }
        session
    }

    /// Route one inbound payload, returning the error instead of reporting it.
    pub async fn handle_message(&self, session: &Arc<ConnectionSession>, raw: &str) -> BrokerResult<()> {
        self.router.route(session, raw).await
    }

    /// Route one inbound payload and report any error. The connection
    /// stays open whatever the outcome.
    pub async fn on_message(&self, session: &Arc<ConnectionSession>, raw: &str) {
        if let Err(e) = self.handle_message(session, raw).await {
            self.report(&e);
        }
    }

    /// Transport closed or errored. Safe to call any number of times.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.sessions.close(id)
    }

    /// Log and count an error. Never propagates.
    pub fn report(&self, err: &BrokerError) {
        metrics::record_error(err.kind());
        match err {
            BrokerError::InvalidMessage {
                connection,
                raw,
                parsed,
            } => tracing::error!(
                connection_id = %connection,
                kind = err.kind(),
                raw_message = %raw,
                parsed_message = %parsed,
                "{}", err
            ),
            BrokerError::SendFailure { connection } => tracing::warn!(
                connection_id = %connection,
                kind = err.kind(),
                "{}", err
            ),
            _ => match (err.connection(), err.raw_message()) {
                (Some(connection), Some(raw)) => tracing::error!(
                    connection_id = %connection,
                    kind = err.kind(),
                    raw_message = %raw,
                    "{}", err
                ),
                (Some(connection), None) => tracing::error!(
                    connection_id = %connection,
                    kind = err.kind(),
                    "{}", err
                ),
                _ => tracing::error!(kind = err.kind(), "{}", err),
            },
        }
    }

    pub fn session(&self, id: ConnectionId) -> Option<Arc<ConnectionSession>> {
        self.sessions.get(id)
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }
}
