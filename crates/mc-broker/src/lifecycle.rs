//! # Lifecycle Monitor
//!
//! Subscribes to the lifecycle topic of the shared bus and turns every
//! `ContextTerminated` into a broker teardown. The subscription is explicit:
//! the monitor owns it, and dropping the monitor task unsubscribes.

use crate::ports::MessageBrokerApi;
use shared_bus::{BusEvent, EventFilter, EventStream, EventSubscriber, EventTopic};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

pub struct LifecycleMonitor {
    broker: Arc<dyn MessageBrokerApi>,
    events: EventStream,
}

impl LifecycleMonitor {
    /// Subscribe to lifecycle events on `bus`.
    pub fn new(bus: &dyn EventSubscriber, broker: Arc<dyn MessageBrokerApi>) -> Self {
        Self {
            broker,
            events: bus
                .subscribe(EventFilter::topics(vec![EventTopic::Lifecycle]))
                .into_stream(),
        }
    }

    /// Forward one event. Returns `false` once the broker is gone.
    pub fn handle_event(&self, event: &BusEvent) -> bool {
        let BusEvent::ContextTerminated { context, cause } = event else {
            debug!(topic = ?event.topic(), "Ignoring non-lifecycle event");
            return true;
        };
        info!(context = %context, cause = ?cause, "Context terminated, tearing down its channels");
        match self.broker.notify_context_terminated(*context) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "Broker unavailable, stopping lifecycle monitor");
                false
            }
        }
    }

    /// Process events until the bus or the broker goes away.
    pub async fn run(mut self) {
        while let Some(event) = self.events.next().await {
            if !self.handle_event(&event) {
                break;
            }
        }
        debug!("Lifecycle monitor stopped");
    }

    /// Run on a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
