//! # Inbound Port - MessageBrokerApi
//!
//! Driving port used by the host to open channels, post messages and report
//! context lifecycle.
//!
//! Every call except `status` only enqueues work for the coordination loop
//! and returns immediately. Outcomes reach endpoints through the
//! `EndpointDispatcher`, never through these return values.

use crate::domain::{BrokerError, BrokerStatus, OpenChannelRequest, PortId};
use async_trait::async_trait;
use shared_types::{ContextId, Message, SourceContext};

#[async_trait]
pub trait MessageBrokerApi: Send + Sync {
    /// Request a channel to a named target.
    ///
    /// Returns the opener port at once. The receiver gets `OnConnect` once
    /// every gate passes; the opener gets `OnDisconnect` if one refuses.
    fn open_channel(&self, request: OpenChannelRequest) -> Result<PortId, BrokerError>;

    /// Request a channel to a specific context (e.g. a tab frame).
    fn open_channel_to_context(
        &self,
        source: SourceContext,
        target_context: ContextId,
        channel_name: String,
    ) -> Result<PortId, BrokerError>;

    /// Request a channel to a native host process.
    fn open_channel_to_native_host(
        &self,
        source: SourceContext,
        host_name: String,
    ) -> Result<PortId, BrokerError>;

    /// Send a message from `source_port` to its peer.
    ///
    /// Queued while the channel negotiates, dropped if it is unknown.
    fn post_message(&self, source_port: PortId, message: Message) -> Result<(), BrokerError>;

    /// Close the channel `port` belongs to. The peer gets `OnDisconnect`.
    fn close_channel(&self, port: PortId, reason: String) -> Result<(), BrokerError>;

    /// Tear down everything hosted by a context that went away.
    fn notify_context_terminated(&self, context: ContextId) -> Result<(), BrokerError>;

    /// Snapshot of broker bookkeeping after all previously sent calls.
    async fn status(&self) -> Result<BrokerStatus, BrokerError>;
}
