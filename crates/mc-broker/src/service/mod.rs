//! # Broker Service
//!
//! Wires the domain stores, gate chain and router into a coordination loop
//! running on its own task, and hands out [`BrokerHandle`]s to drive it.
//!
//! ```rust,ignore
//! let (broker, task) = BrokerService::new(BrokerConfig::default(), ports)
//!     .with_publisher(bus.clone())
//!     .spawn();
//!
//! let port = broker.open_channel(OpenChannelRequest::new(source, "target", "chan"))?;
//! broker.post_message(port, Message::new("hello"))?;
//! ```

mod api;
mod commands;
mod core;
mod gate_chain;
mod router;

pub use api::BrokerHandle;
pub use commands::GateResolution;

use crate::domain::{BrokerConfig, PortIdAllocator};
use crate::ports::{
    ActivationProvider, ConsentPrompt, ContextDirectory, EndpointDispatcher, NativeHostLauncher,
    SecretProvider, TargetRegistry,
};
use shared_bus::EventPublisher;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Every outbound port the broker depends on.
#[derive(Clone)]
pub struct BrokerPorts {
    pub dispatcher: Arc<dyn EndpointDispatcher>,
    pub targets: Arc<dyn TargetRegistry>,
    pub contexts: Arc<dyn ContextDirectory>,
    pub consent: Arc<dyn ConsentPrompt>,
    pub secrets: Arc<dyn SecretProvider>,
    pub activation: Arc<dyn ActivationProvider>,
    pub native_hosts: Arc<dyn NativeHostLauncher>,
}

/// Builder for a running broker.
pub struct BrokerService {
    config: BrokerConfig,
    ports: BrokerPorts,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl BrokerService {
    #[must_use]
    pub fn new(config: BrokerConfig, ports: BrokerPorts) -> Self {
        Self {
            config,
            ports,
            publisher: None,
        }
    }

    /// Publish channel events to `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Start the coordination loop on the current runtime.
    ///
    /// The loop stops on `shutdown` or once every handle is dropped and no
    /// gate provider is still working.
    #[must_use]
    pub fn spawn(self) -> (BrokerHandle, JoinHandle<()>) {
        let allocator = Arc::new(PortIdAllocator::with_period(self.config.channel_id_period));
        let (sender, receiver) = mpsc::unbounded_channel();

        let core = self::core::BrokerCore::new(
            &self.config,
            self.ports,
            Arc::clone(&allocator),
            self.publisher,
            sender.downgrade(),
        );
        let task = tokio::spawn(core.run(receiver));

        (BrokerHandle::new(sender, allocator), task)
    }
}
