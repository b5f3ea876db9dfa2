//! Adapters layer: in-memory implementations of every outbound port.
//!
//! The runtime binary wires these for its demo; tests use them to script the
//! asynchronous gates and observe endpoint deliveries.

pub mod gates;
pub mod native;
pub mod recording;
pub mod registry;

pub use gates::{InMemoryActivation, InMemoryConsent, InMemorySecrets, ManualGate};
pub use native::{InMemoryNativeHosts, HOST_NOT_FOUND};
pub use recording::{Delivery, RecordingDispatcher};
pub use registry::{InMemoryContextDirectory, InMemoryTargetRegistry};

use crate::service::BrokerPorts;
use std::sync::Arc;

/// One of each in-memory adapter, with typed access for scripting.
#[derive(Clone)]
pub struct InMemoryEnvironment {
    pub dispatcher: Arc<RecordingDispatcher>,
    pub targets: Arc<InMemoryTargetRegistry>,
    pub contexts: Arc<InMemoryContextDirectory>,
    pub consent: Arc<InMemoryConsent>,
    pub secrets: Arc<InMemorySecrets>,
    pub activation: Arc<InMemoryActivation>,
    pub native_hosts: Arc<InMemoryNativeHosts>,
}

impl InMemoryEnvironment {
    /// Environment whose consent prompts wait to be answered.
    #[must_use]
    pub fn new() -> Self {
        Self::with_consent(InMemoryConsent::manual())
    }

    #[must_use]
    pub fn with_consent(consent: InMemoryConsent) -> Self {
        Self {
            dispatcher: Arc::new(RecordingDispatcher::new()),
            targets: Arc::new(InMemoryTargetRegistry::new()),
            contexts: Arc::new(InMemoryContextDirectory::new()),
            consent: Arc::new(consent),
            secrets: Arc::new(InMemorySecrets::new()),
            activation: Arc::new(InMemoryActivation::new()),
            native_hosts: Arc::new(InMemoryNativeHosts::new()),
        }
    }

    /// Port bundle sharing these adapters.
    #[must_use]
    pub fn ports(&self) -> BrokerPorts {
        BrokerPorts {
            dispatcher: self.dispatcher.clone(),
            targets: self.targets.clone(),
            contexts: self.contexts.clone(),
            consent: self.consent.clone(),
            secrets: self.secrets.clone(),
            activation: self.activation.clone(),
            native_hosts: self.native_hosts.clone(),
        }
    }
}

impl Default for InMemoryEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
