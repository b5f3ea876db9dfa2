//! Outbound (Driven) ports for the broker.
//!
//! These traits define what the broker needs from its host: somewhere to
//! deliver endpoint events, target and context lookups, and the providers
//! behind the asynchronous gates.
//!
//! Synchronous lookups are called from inside the coordination loop and must
//! not block. Asynchronous providers run on spawned tasks.

use crate::domain::{ConnectInfo, ContextState, PortId, TargetDescriptor};
use async_trait::async_trait;
use shared_types::{ContextId, Message, OriginDescriptor, TargetId};

/// Delivers endpoint events to the contexts hosting the endpoints.
pub trait EndpointDispatcher: Send + Sync {
    /// A channel opened; `port` is the receiver's port.
    fn on_connect(&self, context: ContextId, port: PortId, info: &ConnectInfo);

    /// A message arrived on `port`.
    fn on_message(&self, context: ContextId, port: PortId, message: &Message);

    /// The channel `port` belongs to is gone.
    fn on_disconnect(&self, context: ContextId, port: PortId, reason: &str);

    /// An open channel now references `context`.
    fn increment_keepalive(&self, _context: ContextId) {}

    /// An open channel no longer references `context`.
    fn decrement_keepalive(&self, _context: ContextId) {}
}

/// Lookup of connectable targets.
pub trait TargetRegistry: Send + Sync {
    /// Current descriptor for `target`, or `None` if it is not installed or
    /// not enabled.
    fn lookup(&self, target: &TargetId) -> Option<TargetDescriptor>;
}

/// Liveness of execution contexts.
pub trait ContextDirectory: Send + Sync {
    fn context_state(&self, context: ContextId) -> ContextState;
}

/// What the consent prompt shows the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequest {
    pub target: TargetId,
    pub source_context: ContextId,
    pub source_url: Option<String>,
    pub origin: OriginDescriptor,
}

/// Asks the user whether a restricted-mode web page may reach a target.
#[async_trait]
pub trait ConsentPrompt: Send + Sync {
    /// `true` if the user allowed the connection.
    async fn request_consent(&self, request: ConsentRequest) -> bool;
}

/// Input to channel-binding secret derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRequest {
    pub source_context: ContextId,
    pub source_url: Option<String>,
}

/// Derives the channel-binding secret for an opener.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// The secret, or a failure description.
    async fn derive_secret(&self, request: SecretRequest) -> Result<String, String>;
}

/// Knows where targets run and how to wake them.
#[async_trait]
pub trait ActivationProvider: Send + Sync {
    /// Context currently hosting `target`, if it is running.
    fn resident_context(&self, target: &TargetId) -> Option<ContextId>;

    /// Whether `target` can be started on demand.
    fn supports_activation(&self, target: &TargetId) -> bool;

    /// Start `target`. `None` means activation was abandoned.
    async fn activate(&self, target: &TargetId) -> Option<ContextId>;
}

/// Parameters for starting a native host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeLaunchRequest {
    pub source_context: ContextId,
    pub source_identity: TargetId,
    pub host_name: String,
    /// `false` restricts the search to system-level host manifests.
    pub allow_user_level: bool,
}

/// Starts native host processes.
pub trait NativeHostLauncher: Send + Sync {
    /// Whether `identity` holds native messaging permission.
    fn has_native_messaging_permission(&self, identity: &TargetId) -> bool;

    /// Start a host and return the context hosting its endpoint, or a
    /// human-readable failure reason.
    fn launch(&self, request: &NativeLaunchRequest) -> Result<ContextId, String>;
}
