//! Broker Error Types
//!
//! Centralized error taxonomy for the connection and dispatch engine.
//! Every per-message error is handled locally: it is logged, counted and
//! never allowed to close unrelated connections.

use serde_json::Value;

use crate::domain::{ConnectionId, ResourceError, Verb};

/// Broker error type
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Payload is not valid JSON (or not valid UTF-8)
    #[error("Malformed message from: {connection}")]
    MalformedMessage { connection: ConnectionId, raw: String },

    /// JSON parsed but the envelope shape or `handler` is not recognized
    #[error("Invalid message from: {connection}")]
    InvalidMessage {
        connection: ConnectionId,
        raw: String,
        parsed: Value,
    },

    /// Resource name unresolved, or the resource lacks the requested verb
    #[error("Invalid WebSocketResource: {}", .resource.as_deref().unwrap_or("<none>"))]
    UnknownResource {
        connection: ConnectionId,
        resource: Option<String>,
        verb: Verb,
        raw: String,
    },

    /// A resource verb ran and reported a failure
    #[error("Resource '{resource}' failed to handle '{verb}' for {connection}: {source}")]
    Resource {
        connection: ConnectionId,
        resource: String,
        verb: Verb,
        #[source]
        source: ResourceError,
    },

    #[error("Broadcast failed, no server is available.")]
    BroadcastUnavailable,

    #[error("Failed to send message to client: {connection}")]
    SendFailure { connection: ConnectionId },

    #[error("Failed to encode outbound envelope: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to start WebSocket server: {0}")]
    Startup(#[from] std::io::Error),
}

impl BrokerError {
    /// Stable label used for metrics and structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerError::MalformedMessage { .. } => "malformed_message",
            BrokerError::InvalidMessage { .. } => "invalid_message",
            BrokerError::UnknownResource { .. } => "unknown_resource",
            BrokerError::Resource { .. } => "resource",
            BrokerError::BroadcastUnavailable => "broadcast_unavailable",
            BrokerError::SendFailure { .. } => "send_failure",
            BrokerError::Serialization(_) => "serialization",
            BrokerError::Startup(_) => "startup",
        }
    }

    /// Connection the error is scoped to, if any
    pub fn connection(&self) -> Option<ConnectionId> {
        match self {
            BrokerError::MalformedMessage { connection, .. }
            | BrokerError::InvalidMessage { connection, .. }
            | BrokerError::UnknownResource { connection, .. }
            | BrokerError::Resource { connection, .. }
            | BrokerError::SendFailure { connection } => Some(*connection),
            BrokerError::BroadcastUnavailable
            | BrokerError::Serialization(_)
            | BrokerError::Startup(_) => None,
        }
    }

    /// Raw payload that triggered the error, for diagnostics
    pub fn raw_message(&self) -> Option<&str> {
        match self {
            BrokerError::MalformedMessage { raw, .. }
            | BrokerError::InvalidMessage { raw, .. }
            | BrokerError::UnknownResource { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

/// Convenience result alias
pub type BrokerResult<T> = Result<T, BrokerError>;
