//! # Broker Runtime
//!
//! Owns the pieces of a running broker and their shutdown.
//!
//! ```text
//!   host lifecycle ──publish──► InMemoryEventBus ──lifecycle topic──► LifecycleMonitor
//!                                     ▲                                     │
//!                                     │ channel topic                       │ notify_context_terminated
//!                                     │                                     ▼
//!   embedder ──BrokerHandle──────────────────────────────────────────► coordination loop
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Create the event bus with the configured capacity
//! 2. Spawn the broker coordination loop, publishing to the bus
//! 3. Subscribe the lifecycle monitor and spawn it
//!
//! ## Shutdown Sequence
//!
//! 1. Signal the monitor to stop
//! 2. Ask the broker loop to stop after the commands already queued
//! 3. Wait for both tasks, bounded by the grace period

pub mod container;
pub mod demo;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use broker_telemetry::{component_span, log_event};
use mc_broker::{
    BrokerError, BrokerHandle, BrokerPorts, BrokerService, BrokerStatus, LifecycleMonitor,
    MessageBrokerApi,
};
use shared_bus::{BusEvent, EventPublisher, InMemoryEventBus, TerminationCause};
use shared_types::ContextId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

pub use container::{ConfigError, RuntimeConfig};

const COMPONENT: &str = "runtime";

/// A running broker with its bus and lifecycle monitor.
pub struct BrokerRuntime {
    config: RuntimeConfig,
    bus: Arc<InMemoryEventBus>,
    broker: BrokerHandle,
    broker_task: JoinHandle<()>,
    monitor_task: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl BrokerRuntime {
    /// Start every task on the current tokio runtime.
    pub fn start(config: RuntimeConfig, ports: BrokerPorts) -> Self {
        let span = component_span!("broker_runtime", component = COMPONENT);
        let _entered = span.enter();

        let bus = Arc::new(InMemoryEventBus::with_capacity(config.event_bus_capacity));
        let (broker, broker_task) = BrokerService::new(config.broker.clone(), ports)
            .with_publisher(bus.clone())
            .spawn();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = LifecycleMonitor::new(bus.as_ref(), Arc::new(broker.clone()));
        let monitor_task = tokio::spawn(run_until_shutdown(monitor, shutdown_rx).in_current_span());

        log_event!(
            info,
            COMPONENT,
            "Broker runtime started",
            activation_timeout_ms = config.broker.activation_timeout.as_millis() as u64,
            channel_id_period = config.broker.channel_id_period,
            bus_capacity = config.event_bus_capacity
        );

        Self {
            config,
            bus,
            broker,
            broker_task,
            monitor_task,
            shutdown_tx,
        }
    }

    /// A handle to the broker.
    #[must_use]
    pub fn broker(&self) -> BrokerHandle {
        self.broker.clone()
    }

    /// The shared event bus.
    #[must_use]
    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.bus)
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Announce that `context` is gone, as the host process would.
    ///
    /// Returns the number of bus subscribers that received the event.
    pub async fn context_terminated(&self, context: ContextId, cause: TerminationCause) -> usize {
        self.bus
            .publish(BusEvent::ContextTerminated { context, cause })
            .await
    }

    /// Snapshot of the broker's bookkeeping.
    pub async fn status(&self) -> Result<BrokerStatus, BrokerError> {
        self.broker.status().await
    }

    /// Stop the monitor and the broker loop.
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            config,
            broker,
            broker_task,
            monitor_task,
            shutdown_tx,
            ..
        } = self;
        log_event!(info, COMPONENT, "Initiating graceful shutdown");

        if shutdown_tx.send(true).is_err() {
            debug!("Lifecycle monitor already stopped");
        }
        if let Err(err) = broker.shutdown() {
            debug!(error = %err, "Broker loop already stopped");
        }

        let grace = config.shutdown_grace;
        let joined = tokio::time::timeout(grace, async move {
            let monitor = monitor_task.await;
            let broker = broker_task.await;
            (monitor, broker)
        })
        .await;

        match joined {
            Ok((Ok(()), Ok(()))) => {
                log_event!(info, COMPONENT, "Shutdown complete");
                Ok(())
            }
            Ok((monitor, broker)) => {
                let failure = monitor.err().or(broker.err());
                Err(anyhow!("runtime task failed: {failure:?}"))
            }
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "Tasks still running after grace period");
                Err(anyhow!("shutdown timed out after {grace:?}"))
            }
        }
    }
}

async fn run_until_shutdown(monitor: LifecycleMonitor, mut shutdown: watch::Receiver<bool>) {
    tokio::select! {
        _ = monitor.run() => {}
        _ = shutdown.changed() => {
            info!(component = COMPONENT, "Lifecycle monitor received shutdown signal");
        }
    }
}
