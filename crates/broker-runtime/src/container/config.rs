//! # Runtime Configuration
//!
//! Defaults first, then environment overrides. Every override is validated;
//! a malformed value fails startup instead of being ignored.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MCB_ACTIVATION_TIMEOUT_MS` | `30000` | Upper bound on target activation |
//! | `MCB_PORT_ID_PERIOD` | `i32::MAX / 2` | Channel ids before the allocator wraps |
//! | `MCB_NATIVE_HOST_BLOCKLIST` | empty | Comma separated host names, `*` blocks all |
//! | `MCB_NATIVE_HOST_ALLOWLIST` | empty | Comma separated host names exempt from the blocklist |
//! | `MCB_NATIVE_USER_LEVEL_HOSTS` | unset | `false` restricts launches to system-level hosts |
//! | `MCB_EVENT_BUS_CAPACITY` | `1000` | Events a bus subscriber may lag behind |
//! | `MCB_SHUTDOWN_GRACE_MS` | `2000` | How long shutdown waits for tasks to finish |

use mc_broker::{BrokerConfig, NativeHostPolicy, DEFAULT_CHANNEL_ID_PERIOD};
use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use shared_types::ConfigError;
use std::time::Duration;

pub const ACTIVATION_TIMEOUT_VAR: &str = "MCB_ACTIVATION_TIMEOUT_MS";
pub const PORT_ID_PERIOD_VAR: &str = "MCB_PORT_ID_PERIOD";
pub const NATIVE_HOST_BLOCKLIST_VAR: &str = "MCB_NATIVE_HOST_BLOCKLIST";
pub const NATIVE_HOST_ALLOWLIST_VAR: &str = "MCB_NATIVE_HOST_ALLOWLIST";
pub const NATIVE_USER_LEVEL_HOSTS_VAR: &str = "MCB_NATIVE_USER_LEVEL_HOSTS";
pub const EVENT_BUS_CAPACITY_VAR: &str = "MCB_EVENT_BUS_CAPACITY";
pub const SHUTDOWN_GRACE_VAR: &str = "MCB_SHUTDOWN_GRACE_MS";

/// Default time shutdown waits for the broker and monitor tasks.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Broker configuration.
    pub broker: BrokerConfig,
    /// Per-subscriber buffer of the event bus.
    pub event_bus_capacity: usize,
    /// Grace period for tasks during shutdown.
    pub shutdown_grace: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            event_bus_capacity: DEFAULT_CHANNEL_CAPACITY,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ACTIVATION_TIMEOUT_VAR) {
            let millis = parse_number(ACTIVATION_TIMEOUT_VAR, &value)?;
            if millis == 0 {
                return Err(ConfigError::OutOfRange {
                    variable: ACTIVATION_TIMEOUT_VAR,
                    value: millis,
                    expected: ">= 1",
                });
            }
            config.broker.activation_timeout = Duration::from_millis(millis);
        }

        if let Some(value) = lookup(PORT_ID_PERIOD_VAR) {
            let period = parse_number(PORT_ID_PERIOD_VAR, &value)?;
            if period == 0 || period > u64::from(DEFAULT_CHANNEL_ID_PERIOD) {
                return Err(ConfigError::OutOfRange {
                    variable: PORT_ID_PERIOD_VAR,
                    value: period,
                    expected: "1..=1073741823",
                });
            }
            config.broker.channel_id_period = period as u32;
        }

        let mut policy = NativeHostPolicy::default();
        if let Some(value) = lookup(NATIVE_HOST_BLOCKLIST_VAR) {
            policy.blocklist = parse_list(&value);
        }
        if let Some(value) = lookup(NATIVE_HOST_ALLOWLIST_VAR) {
            policy.allowlist = parse_list(&value);
        }
        if let Some(value) = lookup(NATIVE_USER_LEVEL_HOSTS_VAR) {
            policy.user_level_hosts = Some(parse_bool(NATIVE_USER_LEVEL_HOSTS_VAR, &value)?);
        }
        config.broker.native_host_policy = policy;

        if let Some(value) = lookup(EVENT_BUS_CAPACITY_VAR) {
            let capacity = parse_number(EVENT_BUS_CAPACITY_VAR, &value)?;
            if capacity == 0 {
                return Err(ConfigError::OutOfRange {
                    variable: EVENT_BUS_CAPACITY_VAR,
                    value: capacity,
                    expected: ">= 1",
                });
            }
            config.event_bus_capacity = capacity as usize;
        }

        if let Some(value) = lookup(SHUTDOWN_GRACE_VAR) {
            config.shutdown_grace =
                Duration::from_millis(parse_number(SHUTDOWN_GRACE_VAR, &value)?);
        }

        Ok(config)
    }
}

fn parse_number(variable: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
            variable,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn parse_bool(variable: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            variable,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
