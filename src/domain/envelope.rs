//! Wire envelopes.
//!
//! Every message exchanged over a connection is one JSON object tagged by
//! its `handler` field.
//!
//! ## Inbound
//!
//! ```text
//! { "handler": "init" | "all" | "get" | "query" | "stop" | "watch" | "error",
//!   "resource": <string, optional>,
//!   ...verb-specific fields }
//! ```
//!
//! ## Outbound
//!
//! ```text
//! { handler: "session", id }
//! { handler: "item",    resource, id, data }
//! { handler: "list",    resource, items }
//! { handler: "remove",  resource, id, data }
//! { handler: "error",   resource, params }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use super::value_objects::ConnectionId;

/// Resource verb requested by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    All,
    Get,
    Query,
    Stop,
    Watch,
}

impl Verb {
    /// Every verb, in protocol order.
    pub const ALL: [Verb; 5] = [Verb::All, Verb::Get, Verb::Query, Verb::Stop, Verb::Watch];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::All => "all",
            Verb::Get => "get",
            Verb::Query => "query",
            Verb::Stop => "stop",
            Verb::Watch => "watch",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of inbound handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    /// Client-side protocol error, logged by the server
    Error,
    /// Client asks for its own connection identity
    Init,
    /// Forwarded to the named resource
    Resource(Verb),
}

impl Handler {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handler::Error => "error",
            Handler::Init => "init",
            Handler::Resource(verb) => verb.as_str(),
        }
    }
}

impl fmt::Display for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler string not in the dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown handler: {0}")]
pub struct UnknownHandler(pub String);

impl FromStr for Handler {
    type Err = UnknownHandler;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(Handler::Error),
            "init" => Ok(Handler::Init),
            "all" => Ok(Handler::Resource(Verb::All)),
            "get" => Ok(Handler::Resource(Verb::Get)),
            "query" => Ok(Handler::Resource(Verb::Query)),
            "stop" => Ok(Handler::Resource(Verb::Stop)),
            "watch" => Ok(Handler::Resource(Verb::Watch)),
            other => Err(UnknownHandler(other.to_string())),
        }
    }
}

/// Inbound envelope as sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub handler: String,

    /// Any JSON value; only a non-empty string names a resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,

    /// Verb-specific parameters, `null` when absent
    #[serde(default)]
    pub params: Value,

    /// Any other top-level fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What the `resource` field of an envelope says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef<'a> {
    /// Missing, `null` or an empty string
    Absent,
    Named(&'a str),
    /// Present but not a string
    Invalid(&'a Value),
}

impl InboundEnvelope {
    pub fn resource_ref(&self) -> ResourceRef<'_> {
        match &self.resource {
            None | Some(Value::Null) => ResourceRef::Absent,
            Some(Value::String(name)) if name.is_empty() => ResourceRef::Absent,
            Some(Value::String(name)) => ResourceRef::Named(name),
            Some(other) => ResourceRef::Invalid(other),
        }
    }

    /// Explicit resource name, ignoring empty strings.
    pub fn resource_name(&self) -> Option<&str> {
        match self.resource_ref() {
            ResourceRef::Named(name) => Some(name),
            ResourceRef::Absent | ResourceRef::Invalid(_) => None,
        }
    }

    /// The `resource` field as text for diagnostics, whatever its type.
    pub fn resource_label(&self) -> Option<String> {
        match self.resource_ref() {
            ResourceRef::Absent => None,
            ResourceRef::Named(name) => Some(name.to_string()),
            ResourceRef::Invalid(value) => Some(value.to_string()),
        }
    }

    /// Top-level field other than `handler`, `resource` and `params`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Human readable message carried by an `error` envelope.
    pub fn message(&self) -> Option<&str> {
        self.field("message").and_then(Value::as_str)
    }
}

/// Outbound envelope, the only shapes the broker or a resource may emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "handler", rename_all = "lowercase")]
pub enum OutboundEnvelope {
    Session {
        id: ConnectionId,
    },
    Item {
        resource: String,
        id: Value,
        data: Value,
    },
    List {
        resource: String,
        items: Vec<Value>,
    },
    Remove {
        resource: String,
        id: Value,
        data: Value,
    },
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resource: Option<String>,
        params: Value,
    },
}

impl OutboundEnvelope {
    /// Serialize to the wire text
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn handler(&self) -> &'static str {
        match self {
            OutboundEnvelope::Session { .. } => "session",
            OutboundEnvelope::Item { .. } => "item",
            OutboundEnvelope::List { .. } => "list",
            OutboundEnvelope::Remove { .. } => "remove",
            OutboundEnvelope::Error { .. } => "error",
        }
    }
}
