//! # Broker Domain Entities
//!
//! ## Clusters
//!
//! - **Channels**: `Endpoint`, `Channel`
//! - **Negotiation**: `OpenChannelRequest`, `PendingConnection`, `DeferredClose`,
//!   `PendingMessage`, `ConnectInfo`
//! - **Targets**: `TargetDescriptor`, `ExternallyConnectable`, `RestrictedModeSupport`
//! - **Contexts**: `ContextState`
//! - **Introspection**: `BrokerStatus`

use crate::domain::gate_rules::GateStage;
use crate::domain::port_id::{ChannelId, PortId};
use crate::domain::url_pattern::UrlPattern;
use serde::{Deserialize, Serialize};
use shared_types::{ContextId, Message, OriginDescriptor, SourceContext, TargetId};
use std::collections::BTreeMap;

// =============================================================================
// CLUSTER A: CHANNELS
// =============================================================================

/// One side of an open channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Context hosting the endpoint.
    pub context: ContextId,
}

impl Endpoint {
    #[must_use]
    pub fn new(context: ContextId) -> Self {
        Self { context }
    }
}

/// An open channel: two endpoints sharing one channel id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub opener: Endpoint,
    pub receiver: Endpoint,
}

impl Channel {
    #[must_use]
    pub fn new(id: ChannelId, opener: Endpoint, receiver: Endpoint) -> Self {
        Self {
            id,
            opener,
            receiver,
        }
    }

    /// Endpoint that owns `port`.
    #[must_use]
    pub fn endpoint_for(&self, port: PortId) -> Endpoint {
        if port.is_opener() {
            self.opener
        } else {
            self.receiver
        }
    }

    /// Whether both endpoints live in the same context.
    #[must_use]
    pub fn is_loopback(&self) -> bool {
        self.opener.context == self.receiver.context
    }

    /// Whether either endpoint lives in `context`.
    #[must_use]
    pub fn touches(&self, context: ContextId) -> bool {
        self.opener.context == context || self.receiver.context == context
    }
}

// =============================================================================
// CLUSTER B: NEGOTIATION
// =============================================================================

/// Connection request to a named target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChannelRequest {
    /// Who is asking.
    pub source: SourceContext,
    /// Target to connect to.
    pub target: TargetId,
    /// Free-form channel name handed to the receiver.
    pub channel_name: String,
    /// Whether the opener asked for a channel-binding secret.
    pub wants_secret: bool,
}

impl OpenChannelRequest {
    pub fn new(source: SourceContext, target: impl Into<TargetId>, channel_name: impl Into<String>) -> Self {
        Self {
            source,
            target: target.into(),
            channel_name: channel_name.into(),
            wants_secret: false,
        }
    }

    /// Ask for a channel-binding secret.
    #[must_use]
    pub fn with_secret(mut self) -> Self {
        self.wants_secret = true;
        self
    }
}

/// A close that arrived while the channel was still negotiating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredClose {
    pub port: PortId,
    pub reason: String,
}

/// State of a connection request between the opener's call and the channel
/// opening (or being refused).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConnection {
    pub channel_id: ChannelId,
    pub source: SourceContext,
    /// `None` for direct context connections, which skip target lookup.
    pub target: Option<TargetId>,
    pub channel_name: String,
    pub wants_secret: bool,
    /// Set by the permission gate when the opener is a web page.
    pub is_web_connection: bool,
    /// Filled in once the secret gate resolves.
    pub secret: Option<String>,
    /// Filled in once the activation gate resolves.
    pub receiver_context: Option<ContextId>,
    pub deferred_close: Option<DeferredClose>,
}

impl PendingConnection {
    /// Pending state for a request to a named target.
    #[must_use]
    pub fn for_target(channel_id: ChannelId, request: OpenChannelRequest) -> Self {
        Self {
            channel_id,
            source: request.source,
            target: Some(request.target),
            channel_name: request.channel_name,
            wants_secret: request.wants_secret,
            is_web_connection: false,
            secret: None,
            receiver_context: None,
            deferred_close: None,
        }
    }

    /// Pending state for a request that bypasses the gate chain (a direct
    /// context or native host connection). The target is the opener's own
    /// identity.
    #[must_use]
    pub fn direct(channel_id: ChannelId, source: SourceContext, channel_name: String) -> Self {
        let target = source.identity.clone();
        Self {
            channel_id,
            source,
            target,
            channel_name,
            wants_secret: false,
            is_web_connection: false,
            secret: None,
            receiver_context: None,
            deferred_close: None,
        }
    }

    #[must_use]
    pub fn opener_port(&self) -> PortId {
        self.channel_id.opener_port()
    }

    #[must_use]
    pub fn receiver_port(&self) -> PortId {
        self.channel_id.receiver_port()
    }

    /// What the receiver is told in `OnConnect`.
    #[must_use]
    pub fn connect_info(&self) -> ConnectInfo {
        ConnectInfo {
            channel_name: self.channel_name.clone(),
            origin: self.source.origin.clone(),
            source_identity: self.source.identity.clone(),
            target_identity: self.target.clone(),
            source_url: self.source.url.clone(),
            secret: self.secret.clone(),
        }
    }
}

/// A message posted while its channel was pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub source_port: PortId,
    pub message: Message,
}

/// Connection details delivered to the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectInfo {
    pub channel_name: String,
    pub origin: OriginDescriptor,
    pub source_identity: Option<TargetId>,
    pub target_identity: Option<TargetId>,
    pub source_url: Option<String>,
    /// Channel-binding secret, when one was requested and allowed.
    pub secret: Option<String>,
}

// =============================================================================
// CLUSTER C: TARGETS
// =============================================================================

/// Who may connect to a target from outside its own identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExternallyConnectable {
    /// Identities allowed to connect. `"*"` allows every identity.
    pub ids: Vec<String>,
    /// Web page URL patterns allowed to connect.
    pub matches: Vec<UrlPattern>,
    /// Whether web pages may receive a channel-binding secret.
    pub accepts_secret: bool,
}

impl ExternallyConnectable {
    /// Whether the identified source may connect.
    #[must_use]
    pub fn allows_identity(&self, identity: &TargetId) -> bool {
        self.ids
            .iter()
            .any(|id| id == "*" || id == identity.as_str())
    }

    /// Whether a web page at `url` may connect.
    #[must_use]
    pub fn allows_url(&self, url: &str) -> bool {
        self.matches.iter().any(|pattern| pattern.matches(url))
    }
}

/// How a target behaves towards restricted-mode openers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RestrictedModeSupport {
    /// The user enabled the target in restricted mode.
    pub enabled: bool,
    /// The target runs a separate instance for restricted mode.
    pub split_mode: bool,
    /// The user could enable the target in restricted mode.
    pub can_be_enabled: bool,
}

/// What the registry knows about a connectable target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub id: TargetId,
    /// `None` means only same-identity or identified openers may connect.
    pub externally_connectable: Option<ExternallyConnectable>,
    pub restricted_mode: RestrictedModeSupport,
}

impl TargetDescriptor {
    /// Target with no external connectability and no restricted-mode access.
    pub fn new(id: impl Into<TargetId>) -> Self {
        Self {
            id: id.into(),
            externally_connectable: None,
            restricted_mode: RestrictedModeSupport::default(),
        }
    }

    #[must_use]
    pub fn with_externally_connectable(mut self, connectable: ExternallyConnectable) -> Self {
        self.externally_connectable = Some(connectable);
        self
    }

    #[must_use]
    pub fn with_restricted_mode(mut self, support: RestrictedModeSupport) -> Self {
        self.restricted_mode = support;
        self
    }
}

// =============================================================================
// CLUSTER D: CONTEXTS
// =============================================================================

/// Liveness of an execution context as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextState {
    Live,
    /// Alive but must reload before it can host endpoints.
    NeedsReload,
    Gone,
}

impl ContextState {
    #[must_use]
    pub fn is_live(self) -> bool {
        self == Self::Live
    }
}

// =============================================================================
// CLUSTER E: INTROSPECTION
// =============================================================================

/// Snapshot of broker bookkeeping, taken inside the coordination loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerStatus {
    pub open_channels: usize,
    /// Suspended connection requests per gate.
    pub pending_by_stage: BTreeMap<GateStage, usize>,
    /// Messages parked in pending queues.
    pub queued_messages: usize,
    /// Keep-alive references per context.
    pub keepalive: BTreeMap<ContextId, u32>,
    /// Times the port id sequence wrapped.
    pub port_id_wraps: u64,
}

impl BrokerStatus {
    /// Suspended connection requests across all gates.
    #[must_use]
    pub fn pending_connections(&self) -> usize {
        self.pending_by_stage.values().sum()
    }
}
