//! Broker configuration.

use crate::domain::native_policy::NativeHostPolicy;
use crate::domain::port_id::DEFAULT_CHANNEL_ID_PERIOD;
use std::time::Duration;

/// Default upper bound on target activation.
pub const DEFAULT_ACTIVATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// How long the activation gate waits before abandoning a request.
    pub activation_timeout: Duration,
    /// Channel id period of the port id allocator.
    pub channel_id_period: u32,
    pub native_host_policy: NativeHostPolicy,
    /// Publish channel events when a publisher is attached.
    pub publish_channel_events: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            activation_timeout: DEFAULT_ACTIVATION_TIMEOUT,
            channel_id_period: DEFAULT_CHANNEL_ID_PERIOD,
            native_host_policy: NativeHostPolicy::default(),
            publish_channel_events: true,
        }
    }
}

impl BrokerConfig {
    /// Short timeouts and a small id period for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            activation_timeout: Duration::from_millis(500),
            channel_id_period: 1024,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_activation_timeout(mut self, timeout: Duration) -> Self {
        self.activation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_native_host_policy(mut self, policy: NativeHostPolicy) -> Self {
        self.native_host_policy = policy;
        self
    }
}
