//! # Bus Events
//!
//! Every event that flows through the shared bus.
//!
//! Two topics exist:
//!
//! - `Lifecycle`: published by the host when an execution context goes away.
//!   The broker's lifecycle monitor is the main consumer.
//! - `Channel`: published by the broker when a channel opens, closes, or a
//!   connection request is rejected. Consumed by observers only.

use serde::{Deserialize, Serialize};
use shared_types::ContextId;

/// Why a context disappeared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationCause {
    /// The context died abnormally (crash, kill).
    Terminated,
    /// The context was shut down normally.
    Closed,
}

/// All events that can be published to the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusEvent {
    // =========================================================================
    // LIFECYCLE
    // =========================================================================
    /// An execution context is gone. Any endpoint it hosted is dead.
    ContextTerminated {
        /// The context that went away.
        context: ContextId,
        /// Whether it crashed or was closed.
        cause: TerminationCause,
    },

    // =========================================================================
    // CHANNEL
    // =========================================================================
    /// A channel finished negotiation and is open.
    ChannelOpened {
        /// Channel id (port id / 2).
        channel_id: u32,
        /// Context hosting the opener endpoint.
        opener: ContextId,
        /// Context hosting the receiver endpoint.
        receiver: ContextId,
    },

    /// An open channel was removed from the channel table.
    ChannelClosed {
        /// Channel id (port id / 2).
        channel_id: u32,
        /// Port whose side initiated the close.
        closing_port: u32,
        /// Whether the surviving peer received a disconnect.
        peer_notified: bool,
    },

    /// A connection request was refused by one of the gates.
    ConnectionRejected {
        /// Channel id the request had reserved.
        channel_id: u32,
        /// Context of the opener that was told about the refusal.
        opener: ContextId,
        /// Rejection kind label, e.g. `target_absent`.
        kind: String,
    },
}

impl BusEvent {
    /// Topic this event is published under.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ContextTerminated { .. } => EventTopic::Lifecycle,
            Self::ChannelOpened { .. }
            | Self::ChannelClosed { .. }
            | Self::ConnectionRejected { .. } => EventTopic::Channel,
        }
    }

    /// Contexts this event concerns, for context-scoped filters.
    #[must_use]
    pub fn contexts(&self) -> Vec<ContextId> {
        match self {
            Self::ContextTerminated { context, .. } => vec![*context],
            Self::ChannelOpened {
                opener, receiver, ..
            } => vec![*opener, *receiver],
            Self::ChannelClosed { .. } => Vec::new(),
            Self::ConnectionRejected { opener, .. } => vec![*opener],
        }
    }
}

/// Topics for filtering subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Context lifecycle events.
    Lifecycle,
    /// Channel bookkeeping events.
    Channel,
    /// Matches every topic.
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to accept. Empty accepts all.
    pub topics: Vec<EventTopic>,
    /// Contexts to accept. Empty accepts all.
    pub contexts: Vec<ContextId>,
}

impl EventFilter {
    /// Accept every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Accept only the given topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            contexts: Vec::new(),
        }
    }

    /// Accept only events that concern one of `contexts`.
    #[must_use]
    pub fn for_contexts(contexts: Vec<ContextId>) -> Self {
        Self {
            topics: Vec::new(),
            contexts,
        }
    }

    /// Check whether an event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &BusEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let context_match = self.contexts.is_empty()
            || event
                .contexts()
                .iter()
                .any(|context| self.contexts.contains(context));

        topic_match && context_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminated(id: u64) -> BusEvent {
        BusEvent::ContextTerminated {
            context: ContextId(id),
            cause: TerminationCause::Terminated,
        }
    }

    #[test]
    fn test_event_topic_mapping() {
        assert_eq!(terminated(1).topic(), EventTopic::Lifecycle);
        let opened = BusEvent::ChannelOpened {
            channel_id: 4,
            opener: ContextId(1),
            receiver: ContextId(2),
        };
        assert_eq!(opened.topic(), EventTopic::Channel);
    }

    #[test]
    fn test_filter_all() {
        assert!(EventFilter::all().matches(&terminated(1)));
    }

    #[test]
    fn test_filter_by_topic() {
        let filter = EventFilter::topics(vec![EventTopic::Lifecycle]);
        assert!(filter.matches(&terminated(1)));

        let closed = BusEvent::ChannelClosed {
            channel_id: 1,
            closing_port: 2,
            peer_notified: true,
        };
        assert!(!filter.matches(&closed));
    }

    #[test]
    fn test_filter_by_context() {
        let filter = EventFilter::for_contexts(vec![ContextId(7)]);
        assert!(filter.matches(&terminated(7)));
        assert!(!filter.matches(&terminated(8)));

        let opened = BusEvent::ChannelOpened {
            channel_id: 0,
            opener: ContextId(1),
            receiver: ContextId(7),
        };
        assert!(filter.matches(&opened));
    }

    #[test]
    fn test_closed_event_has_no_context_scope() {
        let closed = BusEvent::ChannelClosed {
            channel_id: 1,
            closing_port: 3,
            peer_notified: false,
        };
        assert!(closed.contexts().is_empty());
        assert!(!EventFilter::for_contexts(vec![ContextId(1)]).matches(&closed));
    }
}
