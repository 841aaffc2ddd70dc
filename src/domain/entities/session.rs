//! Connection session entity.
//!
//! One session per accepted WebSocket connection, built once at connect
//! time with every field present. Outbound frames go through a bounded
//! channel drained by the connection's writer task, so sends from any task
//! into one connection are serialized. Sends never wait: a full queue means
//! the peer stopped reading, and the send fails like a closed one.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

use super::watcher::{WatcherHandle, WatcherRegistry};
use crate::domain::envelope::OutboundEnvelope;
use crate::domain::value_objects::ConnectionId;
use crate::shared::error::{BrokerError, BrokerResult};

/// Outbound frame queued for the writer task.
pub type Frame = Arc<str>;

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Clonable outbound handle for one connection.
///
/// This is what a resource keeps to push later updates. It refers to the
/// connection only through its identity and frame queue, never through
/// the session itself.
#[derive(Clone)]
pub struct SessionSender {
    id: ConnectionId,
    tx: mpsc::Sender<Frame>,
}

impl SessionSender {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Frame>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an already serialized payload.
    ///
    /// Fails with `SendFailure` when the writer has stopped or its queue
    /// is full.
    pub fn send_raw(&self, frame: Frame) -> BrokerResult<()> {
        self.tx.try_send(frame).map_err(|e| {
            if let TrySendError::Full(_) = e {
                tracing::debug!(connection_id = %self.id, "Outbound queue is full");
            }
            BrokerError::SendFailure { connection: self.id }
        })
    }

    pub fn send_object(&self, envelope: &OutboundEnvelope) -> BrokerResult<()> {
        let text = envelope.to_json()?;
        self.send_raw(Arc::from(text))
    }

    /// Tell the client its own identity.
    pub fn send_session(&self) -> BrokerResult<()> {
        self.send_object(&OutboundEnvelope::Session { id: self.id })
    }

    pub fn send_item(
        &self,
        resource: impl Into<String>,
        id: impl Into<Value>,
        data: impl Into<Value>,
    ) -> BrokerResult<()> {
        self.send_object(&OutboundEnvelope::Item {
            resource: resource.into(),
            id: id.into(),
            data: data.into(),
        })
    }

    pub fn send_list(&self, resource: impl Into<String>, items: Vec<Value>) -> BrokerResult<()> {
        self.send_object(&OutboundEnvelope::List {
            resource: resource.into(),
            items,
        })
    }

    pub fn send_remove(
        &self,
        resource: impl Into<String>,
        id: impl Into<Value>,
        data: impl Into<Value>,
    ) -> BrokerResult<()> {
        self.send_object(&OutboundEnvelope::Remove {
            resource: resource.into(),
            id: id.into(),
            data: data.into(),
        })
    }

    pub fn send_error(&self, error: impl Into<Value>, resource: Option<&str>) -> BrokerResult<()> {
        self.send_object(&OutboundEnvelope::Error {
            resource: resource.map(str::to_string),
            params: error.into(),
        })
    }

    /// Whether the writer side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for SessionSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSender").field("id", &self.id).finish()
    }
}

/// State owned by one connection.
pub struct ConnectionSession {
    id: ConnectionId,
    path: String,
    connected_at: DateTime<Utc>,
    sender: SessionSender,
    watchers: WatcherRegistry,
    state: Mutex<ConnectionState>,
    shutdown: Notify,
}

impl ConnectionSession {
    /// Create a session in the `Connecting` state.
    pub fn new(id: ConnectionId, path: impl Into<String>, tx: mpsc::Sender<Frame>) -> Self {
        Self {
            id,
            path: path.into(),
            connected_at: Utc::now(),
            sender: SessionSender::new(id, tx),
            watchers: WatcherRegistry::new(),
            state: Mutex::new(ConnectionState::Connecting),
            shutdown: Notify::new(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Request path the connection was opened on
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Last path segment of the request path, if it is non-empty.
    ///
    /// `/api/nodes` yields `nodes`; `/` and `/nodes/` yield nothing.
    pub fn resource_from_path(&self) -> Option<&str> {
        let path = self
            .path
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or_default();
        path.rsplit('/').next().filter(|segment| !segment.is_empty())
    }

    /// Detached outbound handle for later pushes
    pub fn sender(&self) -> SessionSender {
        self.sender.clone()
    }

    pub fn watchers(&self) -> &WatcherRegistry {
        &self.watchers
    }

    /// Register a watcher under the canonical key of `params`.
    pub fn add_watcher(&self, params: &Value, handle: Arc<WatcherHandle>) -> bool {
        self.watchers.add_for_params(params, Some(handle))
    }

    /// Dispose every watcher registered for `params`.
    pub fn remove_watchers(&self, params: &Value) -> bool {
        self.watchers.remove_for_params(params)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn send_raw(&self, frame: Frame) -> BrokerResult<()> {
        self.sender.send_raw(frame)
    }

    pub fn send_object(&self, envelope: &OutboundEnvelope) -> BrokerResult<()> {
        self.sender.send_object(envelope)
    }

    pub fn send_session(&self) -> BrokerResult<()> {
        self.sender.send_session()
    }

    pub fn send_item(
        &self,
        resource: impl Into<String>,
        id: impl Into<Value>,
        data: impl Into<Value>,
    ) -> BrokerResult<()> {
        self.sender.send_item(resource, id, data)
    }

    pub fn send_list(&self, resource: impl Into<String>, items: Vec<Value>) -> BrokerResult<()> {
        self.sender.send_list(resource, items)
    }

    pub fn send_remove(
        &self,
        resource: impl Into<String>,
        id: impl Into<Value>,
        data: impl Into<Value>,
    ) -> BrokerResult<()> {
        self.sender.send_remove(resource, id, data)
    }

    pub fn send_error(&self, error: impl Into<Value>, resource: Option<&str>) -> BrokerResult<()> {
        self.sender.send_error(error, resource)
    }

    /// Wait until the session is told to terminate.
    pub async fn terminated(&self) {
        self.shutdown.notified().await
    }

    pub(crate) fn mark_open(&self) {
        let mut state = self.state.lock();
        if *state == ConnectionState::Connecting {
            *state = ConnectionState::Open;
        }
    }

    /// Enter `Closing`. Returns `false` if teardown already started.
    pub(crate) fn begin_close(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            ConnectionState::Connecting | ConnectionState::Open => {
                *state = ConnectionState::Closing;
                true
            }
            ConnectionState::Closing | ConnectionState::Closed => false,
        }
    }

    /// Dispose all watchers, enter `Closed` and wake the connection task.
    pub(crate) fn finish_close(&self) -> usize {
        let disposed = self.watchers.remove_all();
        *self.state.lock() = ConnectionState::Closed;
        self.shutdown.notify_one();
        disposed
    }
}

impl fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("state", &self.state())
            .field("watchers", &self.watchers)
            .finish()
    }
}
