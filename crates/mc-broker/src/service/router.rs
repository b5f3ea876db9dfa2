//! Message routing and endpoint notification on top of the channel table.

use crate::domain::{Channel, ChannelId, ChannelTable, ConnectInfo, PortId};
use crate::ports::EndpointDispatcher;
use broker_telemetry::log_port_event;
use shared_types::{ContextId, Message};
use std::sync::Arc;

const COMPONENT: &str = "router";

pub(crate) struct MessageRouter {
    dispatcher: Arc<dyn EndpointDispatcher>,
}

impl MessageRouter {
    pub(crate) fn new(dispatcher: Arc<dyn EndpointDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Record an open channel and forward its keep-alive references.
    pub(crate) fn open(
        &self,
        table: &mut ChannelTable,
        channel: Channel,
    ) -> Result<(), crate::domain::BrokerError> {
        let (opener, receiver) = (channel.opener.context, channel.receiver.context);
        table.open(channel)?;
        self.dispatcher.increment_keepalive(opener);
        self.dispatcher.increment_keepalive(receiver);
        Ok(())
    }

    /// Deliver `message` to the peer of `source`. `false` if the channel is
    /// not open.
    pub(crate) fn route(&self, table: &ChannelTable, source: PortId, message: &Message) -> bool {
        let Some((port, endpoint)) = table.destination(source) else {
            return false;
        };
        self.dispatcher.on_message(endpoint.context, port, message);
        crate::metrics::record_message_routed();
        true
    }

    /// Remove a channel and tell the surviving side when asked to.
    ///
    /// Returns `false` when the channel was not open.
    pub(crate) fn close(
        &self,
        table: &mut ChannelTable,
        channel_id: ChannelId,
        closing_port: PortId,
        reason: &str,
        notify_peer: bool,
    ) -> bool {
        let Some(closed) = table.close(channel_id, closing_port) else {
            return false;
        };
        self.dispatcher
            .decrement_keepalive(closed.channel.opener.context);
        self.dispatcher
            .decrement_keepalive(closed.channel.receiver.context);
        if notify_peer {
            self.dispatcher
                .on_disconnect(closed.peer.context, closed.peer_port, reason);
        }
        log_port_event!(
            info,
            COMPONENT,
            "Channel closed",
            closing_port,
            channel_id = %channel_id,
            peer_notified = notify_peer
        );
        crate::metrics::record_channel_closed(notify_peer);
        true
    }

    pub(crate) fn connect(&self, context: ContextId, port: PortId, info: &ConnectInfo) {
        self.dispatcher.on_connect(context, port, info);
    }

    pub(crate) fn disconnect(&self, context: ContextId, port: PortId, reason: &str) {
        self.dispatcher.on_disconnect(context, port, reason);
    }
}
