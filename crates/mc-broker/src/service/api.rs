//! `MessageBrokerApi` implementation for the broker handle.

use crate::domain::{BrokerError, BrokerStatus, OpenChannelRequest, PortId, PortIdAllocator};
use crate::ports::MessageBrokerApi;
use crate::service::commands::BrokerCommand;
use async_trait::async_trait;
use shared_types::{ContextId, Message, SourceContext};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Cheap, cloneable front door to a running broker.
///
/// Port ids are allocated here, on the caller's thread; everything else is
/// forwarded to the coordination loop in call order.
#[derive(Clone)]
pub struct BrokerHandle {
    commands: mpsc::UnboundedSender<BrokerCommand>,
    allocator: Arc<PortIdAllocator>,
}

impl BrokerHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<BrokerCommand>,
        allocator: Arc<PortIdAllocator>,
    ) -> Self {
        Self {
            commands,
            allocator,
        }
    }

    /// Stop the coordination loop after the commands already sent.
    pub fn shutdown(&self) -> Result<(), BrokerError> {
        self.send(BrokerCommand::Shutdown)
    }

    /// Whether the coordination loop has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// The shared port id allocator.
    #[must_use]
    pub fn allocator(&self) -> &Arc<PortIdAllocator> {
        &self.allocator
    }

    fn send(&self, command: BrokerCommand) -> Result<(), BrokerError> {
        self.commands
            .send(command)
            .map_err(|_| BrokerError::LoopClosed)
    }
}

#[async_trait]
impl MessageBrokerApi for BrokerHandle {
    fn open_channel(&self, request: OpenChannelRequest) -> Result<PortId, BrokerError> {
        let (opener, receiver_port) = self.allocator.allocate_pair();
        self.send(BrokerCommand::OpenChannel {
            receiver_port,
            request,
        })?;
        Ok(opener)
    }

    fn open_channel_to_context(
        &self,
        source: SourceContext,
        target_context: ContextId,
        channel_name: String,
    ) -> Result<PortId, BrokerError> {
        let (opener, receiver_port) = self.allocator.allocate_pair();
        self.send(BrokerCommand::OpenChannelToContext {
            receiver_port,
            source,
            target_context,
            channel_name,
        })?;
        Ok(opener)
    }

    fn open_channel_to_native_host(
        &self,
        source: SourceContext,
        host_name: String,
    ) -> Result<PortId, BrokerError> {
        let (opener, receiver_port) = self.allocator.allocate_pair();
        self.send(BrokerCommand::OpenChannelToNativeHost {
            receiver_port,
            source,
            host_name,
        })?;
        Ok(opener)
    }

    fn post_message(&self, source_port: PortId, message: Message) -> Result<(), BrokerError> {
        self.send(BrokerCommand::PostMessage {
            source_port,
            message,
        })
    }

    fn close_channel(&self, port: PortId, reason: String) -> Result<(), BrokerError> {
        self.send(BrokerCommand::CloseChannel { port, reason })
    }

    fn notify_context_terminated(&self, context: ContextId) -> Result<(), BrokerError> {
        self.send(BrokerCommand::ContextTerminated { context })
    }

    async fn status(&self) -> Result<BrokerStatus, BrokerError> {
        let (reply, response) = oneshot::channel();
        self.send(BrokerCommand::Status { reply })?;
        response.await.map_err(|_| BrokerError::LoopClosed)
    }
}
