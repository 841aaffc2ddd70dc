//! Message Routing
//!
//! Parses inbound payloads into envelopes, routes the built-in handlers and
//! forwards resource verbs to the resource dispatcher.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::domain::resource;
use crate::domain::{
    ConnectionId, ConnectionSession, Handler, InboundEnvelope, ResourceCall, ResourceRef,
    ResourceTable, Verb,
};
use crate::infrastructure::metrics;
use crate::shared::error::{BrokerError, BrokerResult};

/// Resolves a resource by name and invokes the requested verb.
#[derive(Debug, Clone)]
pub struct ResourceDispatcher {
    resources: ResourceTable,
}

impl ResourceDispatcher {
    pub fn new(resources: ResourceTable) -> Self {
        Self { resources }
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// Resource name for a request: the explicit `resource` field, else the
    /// last segment of the connection's request path. A `resource` field
    /// that is not a string resolves to nothing.
    pub fn resolve<'a>(
        &self,
        envelope: &'a InboundEnvelope,
        session: &'a ConnectionSession,
    ) -> Option<&'a str> {
        match envelope.resource_ref() {
            ResourceRef::Named(name) => Some(name),
            ResourceRef::Absent => session.resource_from_path(),
            ResourceRef::Invalid(_) => None,
        }
    }

    /// Invoke `verb` on the resolved resource.
    ///
    /// Fails with `UnknownResource` when the name does not resolve or the
    /// resource does not implement the verb. The verb's own result is
    /// passed back as is; replies are the resource's business.
    pub async fn dispatch(
        &self,
        verb: Verb,
        envelope: InboundEnvelope,
        session: &Arc<ConnectionSession>,
        raw: Arc<str>,
    ) -> BrokerResult<()> {
        tracing::debug!(
            connection_id = %session.id(),
            raw_message = %raw,
            "Client requested a resource call"
        );

        let name = self.resolve(&envelope, session).map(str::to_string);
        let target = name
            .as_deref()
            .and_then(|name| self.resources.get(name))
            .filter(|resource| resource.supports(verb))
            .cloned();

        let (name, target) = match (name, target) {
            (Some(name), Some(target)) => (name, target),
            (name, _) => {
                return Err(BrokerError::UnknownResource {
                    connection: session.id(),
                    resource: name.or_else(|| envelope.resource_label()),
                    verb,
                    raw: raw.to_string(),
                })
            }
        };

        let call = ResourceCall {
            verb,
            resource: name.clone(),
            envelope,
            session: Arc::clone(session),
            raw,
        };
        resource::invoke(target.as_ref(), call)
            .await
            .map_err(|source| BrokerError::Resource {
                connection: session.id(),
                resource: name,
                verb,
                source,
            })
    }
}

/// Dispatch table for inbound envelopes.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    dispatcher: ResourceDispatcher,
}

impl MessageRouter {
    pub fn new(resources: ResourceTable) -> Self {
        Self {
            dispatcher: ResourceDispatcher::new(resources),
        }
    }

    pub fn dispatcher(&self) -> &ResourceDispatcher {
        &self.dispatcher
    }

    /// Parse a raw payload into its handler and envelope.
    pub fn parse(connection: ConnectionId, raw: &str) -> BrokerResult<(Handler, InboundEnvelope)> {
        let parsed: Value =
            serde_json::from_str(raw).map_err(|_| BrokerError::MalformedMessage {
                connection,
                raw: raw.to_string(),
            })?;

        let invalid = |parsed: Value| BrokerError::InvalidMessage {
            connection,
            raw: raw.to_string(),
            parsed,
        };

        let envelope = match InboundEnvelope::deserialize(&parsed) {
            Ok(envelope) => envelope,
            Err(_) => return Err(invalid(parsed)),
        };
        match envelope.handler.parse::<Handler>() {
            Ok(handler) => Ok((handler, envelope)),
            Err(_) => Err(invalid(parsed)),
        }
    }

    /// Handle one inbound payload for `session`.
    pub async fn route(&self, session: &Arc<ConnectionSession>, raw: &str) -> BrokerResult<()> {
        tracing::debug!(
            connection_id = %session.id(),
            raw_message = %raw,
            "Client message was received"
        );

        let (handler, envelope) = Self::parse(session.id(), raw)?;
        metrics::record_message(handler.as_str());

        match handler {
            Handler::Init => session.send_session(),
            Handler::Error => {
                tracing::error!(
                    connection_id = %session.id(),
                    client_message = envelope.message().unwrap_or_default(),
                    params = %envelope.params,
                    "Client reported an error"
                );
                Ok(())
            }
            Handler::Resource(verb) => {
                self.dispatcher
                    .dispatch(verb, envelope, session, Arc::from(raw))
                    .await
            }
        }
    }
}
