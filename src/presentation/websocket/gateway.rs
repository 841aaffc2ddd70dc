//! WebSocket Gateway
//!
//! The session registry (who is currently connected) and the broadcaster
//! fanning one payload out to every registered connection.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::{ConnectionId, ConnectionSession, Frame, OutboundEnvelope};
use crate::infrastructure::metrics;

/// Produces a fresh identity per connection
pub type IdGenerator = Arc<dyn Fn() -> ConnectionId + Send + Sync>;

/// Process-wide map from connection identity to session.
///
/// Registration and removal go through the map's shard locks, so the
/// broadcaster can iterate concurrently with connects and disconnects.
/// Teardown removes the entry first and only the caller that removed it
/// disposes the watchers, which makes `close` run exactly once.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<ConnectionId, Arc<ConnectionSession>>>,
    id_generator: IdGenerator,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(ConnectionId::new))
    }

    /// Use a custom identity source.
    pub fn with_id_generator(id_generator: IdGenerator) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            id_generator,
        }
    }

    /// Register a new connected session.
    ///
    /// Identities are drawn until one is not in use, so every registered
    /// connection has a unique identity.
    pub fn register(
        &self,
        path: impl Into<String>,
        tx: mpsc::Sender<Frame>,
    ) -> Arc<ConnectionSession> {
        let path = path.into();
        let session = loop {
            let id = (self.id_generator)();
            match self.sessions.entry(id) {
                Entry::Occupied(_) => {
                    tracing::warn!(connection_id = %id, "Connection identity collision, regenerating");
                }
                Entry::Vacant(slot) => {
                    let session = Arc::new(ConnectionSession::new(id, path, tx));
                    session.mark_open();
                    slot.insert(Arc::clone(&session));
                    break session;
                }
            }
        };

        metrics::set_websocket_connections(self.sessions.len());
        tracing::debug!(
            connection_id = %session.id(),
            path = %session.path(),
            "Client connected to WebSocketServer"
        );
        session
    }

    /// Tear a connection down: remove it, dispose its watchers and signal
    /// its transport task to terminate.
    ///
    /// Returns `false` when the connection was already gone.
    pub fn close(&self, id: ConnectionId) -> bool {
        let Some((_, session)) = self.sessions.remove(&id) else {
            return false;
        };
        if !session.begin_close() {
            return false;
        }
        let disposed = session.finish_close();
        metrics::set_websocket_connections(self.sessions.len());

        tracing::debug!(
            connection_id = %id,
            watchers_disposed = disposed,
            "Client disconnected from WebSocketServer"
        );
        true
    }

    /// Tear down every registered connection. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        self.ids().into_iter().filter(|id| self.close(*id)).count()
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<ConnectionSession>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Send an envelope to a connection by identity.
    ///
    /// Returns `false` if the connection is gone or its writer has stopped.
    pub fn send_to(&self, id: ConnectionId, envelope: &OutboundEnvelope) -> bool {
        match self.get(id) {
            Some(session) => session.send_object(envelope).is_ok(),
            None => false,
        }
    }

    /// Point-in-time copy of the registered sessions
    pub fn snapshot(&self) -> Vec<Arc<ConnectionSession>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    /// Get session count
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

/// Per-connection predicate: `true` excludes the connection from a broadcast
pub type SkipFn<'a> = &'a (dyn Fn(&ConnectionSession) -> bool + Send + Sync);

/// Outcome counts of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Fans a pre-serialized payload out to registered connections.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    sessions: SessionRegistry,
}

impl Broadcaster {
    pub fn new(sessions: SessionRegistry) -> Self {
        Self { sessions }
    }

    /// Send `payload` to every registered connection not excluded by `skip`.
    ///
    /// A connection whose send fails is torn down on the spot; delivery to
    /// the remaining connections continues.
    pub fn broadcast(&self, payload: impl Into<Frame>, skip: Option<SkipFn<'_>>) -> BroadcastReport {
        let payload: Frame = payload.into();
        let mut report = BroadcastReport::default();

        for session in self.sessions.snapshot() {
            if skip.is_some_and(|skip| skip(session.as_ref())) {
                report.skipped += 1;
                continue;
            }
            match session.send_raw(Arc::clone(&payload)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %session.id(),
                        error = %e,
                        "Failed to send message to client"
                    );
                    self.sessions.close(session.id());
                    report.failed += 1;
                }
            }
        }

        metrics::record_broadcast(report.delivered, report.skipped, report.failed);
        tracing::debug!(
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "Broadcast complete"
        );
        report
    }
}
