//! Resource contract.
//!
//! A resource is a named, externally implemented unit exposing zero or
//! more of the verbs `all`, `get`, `query`, `stop` and `watch`. The broker
//! only resolves the name, checks the capability and invokes the verb; the
//! resource is solely responsible for sending reply envelopes through the
//! session it is handed.
//!
//! Verbs are awaited in the connection's message loop, so one connection's
//! messages never interleave. Long-lived producers (watchers) should be
//! spawned and registered in the session's watcher registry, keeping only a
//! [`SessionSender`](super::SessionSender) for later pushes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::entities::ConnectionSession;
use super::envelope::{InboundEnvelope, Verb};

/// Error returned by a resource verb.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ResourceResult = Result<(), ResourceError>;

/// Everything a verb needs to answer one request.
#[derive(Clone)]
pub struct ResourceCall {
    pub verb: Verb,
    /// Resolved resource name
    pub resource: String,
    pub envelope: InboundEnvelope,
    pub session: Arc<ConnectionSession>,
    /// Payload exactly as received
    pub raw: Arc<str>,
}

impl fmt::Debug for ResourceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCall")
            .field("verb", &self.verb)
            .field("resource", &self.resource)
            .field("connection_id", &self.session.id())
            .field("raw", &self.raw)
            .finish()
    }
}

/// A named server-side resource.
///
/// Only the verbs listed by [`verbs`](Resource::verbs) are ever invoked;
/// the others keep their no-op defaults.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Verbs this resource answers
    fn verbs(&self) -> &[Verb];

    fn supports(&self, verb: Verb) -> bool {
        self.verbs().contains(&verb)
    }

    async fn all(&self, call: ResourceCall) -> ResourceResult {
        let _ = call;
        Ok(())
    }

    async fn get(&self, call: ResourceCall) -> ResourceResult {
        let _ = call;
        Ok(())
    }

    async fn query(&self, call: ResourceCall) -> ResourceResult {
        let _ = call;
        Ok(())
    }

    async fn stop(&self, call: ResourceCall) -> ResourceResult {
        let _ = call;
        Ok(())
    }

    async fn watch(&self, call: ResourceCall) -> ResourceResult {
        let _ = call;
        Ok(())
    }
}

/// Invoke the method matching `call.verb`.
pub async fn invoke(resource: &dyn Resource, call: ResourceCall) -> ResourceResult {
    match call.verb {
        Verb::All => resource.all(call).await,
        Verb::Get => resource.get(call).await,
        Verb::Query => resource.query(call).await,
        Verb::Stop => resource.stop(call).await,
        Verb::Watch => resource.watch(call).await,
    }
}

/// Mapping from resource name to implementation. Read-only once handed
/// to the connection service.
#[derive(Clone, Default)]
pub struct ResourceTable {
    resources: HashMap<String, Arc<dyn Resource>>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with(mut self, name: impl Into<String>, resource: impl Resource + 'static) -> Self {
        self.insert(name, Arc::new(resource));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, resource: Arc<dyn Resource>) {
        self.resources.insert(name.into(), resource);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Resource>> {
        self.resources.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl fmt::Debug for ResourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ResourceTable").field("resources", &names).finish()
    }
}
