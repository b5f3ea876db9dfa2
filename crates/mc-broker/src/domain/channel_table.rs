//! # Channel Table
//!
//! Open channels by id, plus the keep-alive ledger: every open channel holds
//! one keep-alive reference on each endpoint's context, released when the
//! channel closes.

use crate::domain::entities::{Channel, Endpoint};
use crate::domain::errors::BrokerError;
use crate::domain::port_id::{ChannelId, PortId};
use shared_types::ContextId;
use std::collections::{BTreeMap, HashMap};

/// A channel removed by [`ChannelTable::close`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedChannel {
    pub channel: Channel,
    /// Port that survived the close.
    pub peer_port: PortId,
    /// Endpoint that survived the close.
    pub peer: Endpoint,
}

/// Close work for one channel touched by a terminated context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationClose {
    pub channel_id: ChannelId,
    /// Port on the terminated side.
    pub closing_port: PortId,
    /// Whether the other side lives in a different context.
    pub notify_peer: bool,
}

#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: HashMap<ChannelId, Channel>,
    keepalive: HashMap<ContextId, u32>,
}

impl ChannelTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an open channel and take keep-alive references on both sides.
    pub fn open(&mut self, channel: Channel) -> Result<(), BrokerError> {
        if self.channels.contains_key(&channel.id) {
            return Err(BrokerError::ChannelAlreadyOpen(channel.id));
        }
        self.retain(channel.opener.context);
        self.retain(channel.receiver.context);
        self.channels.insert(channel.id, channel);
        Ok(())
    }

    /// Remove a channel and release its keep-alive references.
    ///
    /// Returns `None` when the channel is not open.
    pub fn close(&mut self, channel_id: ChannelId, closing_port: PortId) -> Option<ClosedChannel> {
        let channel = self.channels.remove(&channel_id)?;
        self.release(channel.opener.context);
        self.release(channel.receiver.context);
        let peer_port = closing_port.opposite();
        let peer = channel.endpoint_for(peer_port);
        Some(ClosedChannel {
            channel,
            peer_port,
            peer,
        })
    }

    #[must_use]
    pub fn contains(&self, channel_id: ChannelId) -> bool {
        self.channels.contains_key(&channel_id)
    }

    /// Port and endpoint a message posted on `source` goes to.
    #[must_use]
    pub fn destination(&self, source: PortId) -> Option<(PortId, Endpoint)> {
        let channel = self.channels.get(&source.channel_id())?;
        let dest = source.opposite();
        Some((dest, channel.endpoint_for(dest)))
    }

    /// Channels with at least one endpoint in `context`.
    ///
    /// When both endpoints live in `context` the opener side closes and the
    /// peer is not notified.
    #[must_use]
    pub fn hosted_by(&self, context: ContextId) -> Vec<TerminationClose> {
        let mut closes: Vec<TerminationClose> = self
            .channels
            .values()
            .filter(|channel| channel.touches(context))
            .map(|channel| {
                let closing_port = if channel.opener.context == context {
                    channel.id.opener_port()
                } else {
                    channel.id.receiver_port()
                };
                TerminationClose {
                    channel_id: channel.id,
                    closing_port,
                    notify_peer: !channel.is_loopback(),
                }
            })
            .collect();
        closes.sort_by_key(|close| close.channel_id);
        closes
    }

    /// Open channels currently holding a reference on `context`.
    #[must_use]
    pub fn keepalive_count(&self, context: ContextId) -> u32 {
        self.keepalive.get(&context).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn keepalive_snapshot(&self) -> BTreeMap<ContextId, u32> {
        self.keepalive.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn retain(&mut self, context: ContextId) {
        *self.keepalive.entry(context).or_insert(0) += 1;
    }

    fn release(&mut self, context: ContextId) {
        if let Some(count) = self.keepalive.get_mut(&context) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.keepalive.remove(&context);
            }
        }
    }
}
