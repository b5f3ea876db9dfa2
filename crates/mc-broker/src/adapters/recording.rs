//! Dispatcher that records every endpoint event.
//!
//! Used by the runtime demo and by tests to observe what endpoints would
//! have seen.

use crate::domain::{ConnectInfo, PortId};
use crate::ports::EndpointDispatcher;
use parking_lot::Mutex;
use shared_types::{ContextId, Message};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::trace;

/// One endpoint event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Connect {
        context: ContextId,
        port: PortId,
        info: ConnectInfo,
    },
    Message {
        context: ContextId,
        port: PortId,
        message: Message,
    },
    Disconnect {
        context: ContextId,
        port: PortId,
        reason: String,
    },
}

impl Delivery {
    #[must_use]
    pub fn port(&self) -> PortId {
        match self {
            Self::Connect { port, .. } | Self::Message { port, .. } | Self::Disconnect { port, .. } => {
                *port
            }
        }
    }

    #[must_use]
    pub fn context(&self) -> ContextId {
        match self {
            Self::Connect { context, .. }
            | Self::Message { context, .. }
            | Self::Disconnect { context, .. } => *context,
        }
    }
}

#[derive(Default)]
pub struct RecordingDispatcher {
    deliveries: Mutex<Vec<Delivery>>,
    keepalive: Mutex<HashMap<ContextId, i64>>,
    changed: Notify,
}

impl RecordingDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in delivery order.
    #[must_use]
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Deliveries addressed to `port`.
    #[must_use]
    pub fn deliveries_to(&self, port: PortId) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| d.port() == port)
            .cloned()
            .collect()
    }

    /// Payloads delivered to `port`, in order.
    #[must_use]
    pub fn messages_to(&self, port: PortId) -> Vec<String> {
        self.deliveries
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Message { port: p, message, .. } if *p == port => {
                    Some(message.data.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Disconnect reasons delivered to `port`.
    #[must_use]
    pub fn disconnects_to(&self, port: PortId) -> Vec<String> {
        self.deliveries
            .lock()
            .iter()
            .filter_map(|d| match d {
                Delivery::Disconnect { port: p, reason, .. } if *p == port => Some(reason.clone()),
                _ => None,
            })
            .collect()
    }

    /// Connect info delivered to `port`, if any.
    #[must_use]
    pub fn connect_to(&self, port: PortId) -> Option<(ContextId, ConnectInfo)> {
        self.deliveries.lock().iter().find_map(|d| match d {
            Delivery::Connect { context, port: p, info } if *p == port => {
                Some((*context, info.clone()))
            }
            _ => None,
        })
    }

    /// Net keep-alive references forwarded for `context`.
    #[must_use]
    pub fn keepalive(&self, context: ContextId) -> i64 {
        self.keepalive.lock().get(&context).copied().unwrap_or(0)
    }

    pub fn clear(&self) {
        self.deliveries.lock().clear();
    }

    /// Wait until `predicate` holds over the recorded deliveries.
    ///
    /// Returns `false` if `limit` elapses first.
    pub async fn wait_until<F>(&self, limit: Duration, predicate: F) -> bool
    where
        F: Fn(&[Delivery]) -> bool,
    {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let changed = self.changed.notified();
            if predicate(&self.deliveries.lock()) {
                return true;
            }
            if tokio::time::timeout_at(deadline, changed).await.is_err() {
                return predicate(&self.deliveries.lock());
            }
        }
    }

    fn record(&self, delivery: Delivery) {
        trace!(?delivery, "Recorded delivery");
        self.deliveries.lock().push(delivery);
        self.changed.notify_waiters();
    }

    fn adjust_keepalive(&self, context: ContextId, delta: i64) {
        *self.keepalive.lock().entry(context).or_insert(0) += delta;
    }
}

impl EndpointDispatcher for RecordingDispatcher {
    fn on_connect(&self, context: ContextId, port: PortId, info: &ConnectInfo) {
        self.record(Delivery::Connect {
            context,
            port,
            info: info.clone(),
        });
    }

    fn on_message(&self, context: ContextId, port: PortId, message: &Message) {
        self.record(Delivery::Message {
            context,
            port,
            message: message.clone(),
        });
    }

    fn on_disconnect(&self, context: ContextId, port: PortId, reason: &str) {
        self.record(Delivery::Disconnect {
            context,
            port,
            reason: reason.to_string(),
        });
    }

    fn increment_keepalive(&self, context: ContextId) {
        self.adjust_keepalive(context, 1);
    }

    fn decrement_keepalive(&self, context: ContextId) {
        self.adjust_keepalive(context, -1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_records_in_order() {
        let dispatcher = RecordingDispatcher::new();
        dispatcher.on_message(ContextId(1), PortId::new(3), &Message::new("a"));
        dispatcher.on_message(ContextId(1), PortId::new(3), &Message::new("b"));
        dispatcher.on_disconnect(ContextId(1), PortId::new(3), "bye");

        assert_eq!(dispatcher.messages_to(PortId::new(3)), vec!["a", "b"]);
        assert_eq!(dispatcher.disconnects_to(PortId::new(3)), vec!["bye"]);
        assert_eq!(dispatcher.deliveries().len(), 3);
    }

    #[test]
    fn test_keepalive_tracking() {
        let dispatcher = RecordingDispatcher::new();
        dispatcher.increment_keepalive(ContextId(2));
        dispatcher.increment_keepalive(ContextId(2));
        dispatcher.decrement_keepalive(ContextId(2));
        assert_eq!(dispatcher.keepalive(ContextId(2)), 1);
    }

    #[tokio::test]
    async fn test_wait_until_wakes_on_delivery() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let writer = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            writer.on_disconnect(ContextId(1), PortId::new(0), "late");
        });

        let seen = dispatcher
            .wait_until(Duration::from_secs(1), |d| !d.is_empty())
            .await;
        assert!(seen);
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        let dispatcher = RecordingDispatcher::new();
        let seen = dispatcher
            .wait_until(Duration::from_millis(20), |d| !d.is_empty())
            .await;
        assert!(!seen);
    }
}
