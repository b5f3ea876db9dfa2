//! Commands processed by the coordination loop.

use crate::domain::{BrokerStatus, ChannelId, GateStage, OpenChannelRequest, PortId};
use shared_types::{ContextId, Message, SourceContext};
use tokio::sync::oneshot;

/// Answer from an asynchronous gate provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateResolution {
    Consent(bool),
    Secret(Result<String, String>),
    /// `None` when activation failed or timed out.
    Activation(Option<ContextId>),
}

impl GateResolution {
    /// Stage this resolution completes.
    #[must_use]
    pub fn stage(&self) -> GateStage {
        match self {
            Self::Consent(_) => GateStage::AwaitingConsent,
            Self::Secret(_) => GateStage::AwaitingSecret,
            Self::Activation(_) => GateStage::AwaitingActivation,
        }
    }
}

#[derive(Debug)]
pub enum BrokerCommand {
    OpenChannel {
        receiver_port: PortId,
        request: OpenChannelRequest,
    },
    OpenChannelToContext {
        receiver_port: PortId,
        source: SourceContext,
        target_context: ContextId,
        channel_name: String,
    },
    OpenChannelToNativeHost {
        receiver_port: PortId,
        source: SourceContext,
        host_name: String,
    },
    PostMessage {
        source_port: PortId,
        message: Message,
    },
    CloseChannel {
        port: PortId,
        reason: String,
    },
    ContextTerminated {
        context: ContextId,
    },
    GateResolved {
        channel_id: ChannelId,
        resolution: GateResolution,
    },
    Status {
        reply: oneshot::Sender<BrokerStatus>,
    },
    Shutdown,
}

impl BrokerCommand {
    /// Short label for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenChannel { .. } => "open_channel",
            Self::OpenChannelToContext { .. } => "open_channel_to_context",
            Self::OpenChannelToNativeHost { .. } => "open_channel_to_native_host",
            Self::PostMessage { .. } => "post_message",
            Self::CloseChannel { .. } => "close_channel",
            Self::ContextTerminated { .. } => "context_terminated",
            Self::GateResolved { .. } => "gate_resolved",
            Self::Status { .. } => "status",
            Self::Shutdown => "shutdown",
        }
    }
}
