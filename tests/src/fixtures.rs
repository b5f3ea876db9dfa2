//! Harness around a running [`BrokerRuntime`] and the in-memory adapters.

use std::time::Duration;

use broker_runtime::{BrokerRuntime, RuntimeConfig};
use mc_broker::adapters::{Delivery, InMemoryEnvironment};
use mc_broker::{
    BrokerConfig, BrokerHandle, BrokerStatus, PortId, TargetDescriptor,
};
use shared_bus::TerminationCause;
use shared_types::{ContextId, SourceContext};

/// How long a scenario waits for an expected delivery.
pub const WAIT: Duration = Duration::from_secs(2);

pub struct BrokerFixture {
    pub env: InMemoryEnvironment,
    pub runtime: BrokerRuntime,
}

impl BrokerFixture {
    /// Runtime with test timeouts and a small port id period.
    pub fn start() -> Self {
        Self::start_with(RuntimeConfig {
            broker: BrokerConfig::for_testing(),
            ..RuntimeConfig::default()
        })
    }

    pub fn start_with(config: RuntimeConfig) -> Self {
        let env = InMemoryEnvironment::new();
        let runtime = BrokerRuntime::start(config, env.ports());
        Self { env, runtime }
    }

    pub fn broker(&self) -> BrokerHandle {
        self.runtime.broker()
    }

    /// Install `target` already running in `context`.
    pub fn resident_target(&self, target: &str, context: ContextId) {
        self.env.targets.install(TargetDescriptor::new(target));
        self.env.activation.set_resident(target, context);
    }

    /// Install `target` that starts on demand.
    pub fn lazy_target(&self, target: &str) {
        self.env.targets.install(TargetDescriptor::new(target));
        self.env.activation.enable_activation(target);
    }

    /// Status snapshot; also waits for every command sent so far.
    pub async fn settle(&self) -> BrokerStatus {
        self.runtime
            .status()
            .await
            .expect("broker loop should be running")
    }

    /// Publish a termination on the bus, as the host would.
    ///
    /// The lifecycle monitor forwards it on its own task; follow with
    /// [`BrokerFixture::wait_for_status`] to observe the effect.
    pub async fn terminate(&self, context: ContextId) {
        self.runtime
            .context_terminated(context, TerminationCause::Terminated)
            .await;
    }

    /// Poll the status snapshot until `predicate` holds.
    pub async fn wait_for_status(&self, predicate: impl Fn(&BrokerStatus) -> bool) -> BrokerStatus {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let status = self.settle().await;
            if predicate(&status) || tokio::time::Instant::now() >= deadline {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    pub async fn wait_for(&self, predicate: impl Fn(&[Delivery]) -> bool) {
        assert!(
            self.env.dispatcher.wait_until(WAIT, predicate).await,
            "expected deliveries not seen: {:#?}",
            self.env.dispatcher.deliveries()
        );
    }

    pub async fn shutdown(self) {
        self.runtime
            .shutdown()
            .await
            .expect("runtime should shut down cleanly");
    }
}

pub fn extension(context: u64, id: &str) -> SourceContext {
    SourceContext::identity(ContextId(context), id)
}

/// Deliveries of one kind addressed to `port`.
pub fn count(deliveries: &[Delivery], port: PortId, kind: fn(&Delivery) -> bool) -> usize {
    deliveries
        .iter()
        .filter(|d| d.port() == port && kind(d))
        .count()
}

pub fn is_connect(delivery: &Delivery) -> bool {
    matches!(delivery, Delivery::Connect { .. })
}

pub fn is_message(delivery: &Delivery) -> bool {
    matches!(delivery, Delivery::Message { .. })
}

pub fn is_disconnect(delivery: &Delivery) -> bool {
    matches!(delivery, Delivery::Disconnect { .. })
}
