//! # Broker Metrics
//!
//! Prometheus metrics for channel traffic and negotiation health.
//!
//! Enable with the `metrics` feature:
//! ```toml
//! mc-broker = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `broker_channels_opened_total` - Counter of channels opened
//! - `broker_channels_closed_total` - Counter of channels closed (by `notified`)
//! - `broker_connections_rejected_total` - Counter of refused requests (by `kind`)
//! - `broker_messages_routed_total` - Counter of messages delivered to a peer
//! - `broker_messages_queued_total` - Counter of messages parked while pending
//! - `broker_messages_dropped_total` - Counter of messages for unknown ports
//! - `broker_pending_connections` - Gauge of requests suspended at a gate
//! - `broker_port_id_wraps_total` - Counter of port id sequence wraps

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref CHANNELS_OPENED: IntCounter = register_int_counter!(
        "broker_channels_opened_total",
        "Total number of channels opened"
    )
    .expect("Failed to create CHANNELS_OPENED metric");

    /// Labeled by whether the peer received a disconnect
    pub static ref CHANNELS_CLOSED: IntCounterVec = register_int_counter_vec!(
        "broker_channels_closed_total",
        "Total number of channels closed",
        &["notified"]
    )
    .expect("Failed to create CHANNELS_CLOSED metric");

    /// Labeled by rejection kind
    pub static ref CONNECTIONS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "broker_connections_rejected_total",
        "Total number of connection requests refused or abandoned",
        &["kind"]
    )
    .expect("Failed to create CONNECTIONS_REJECTED metric");

    pub static ref MESSAGES_ROUTED: IntCounter = register_int_counter!(
        "broker_messages_routed_total",
        "Total number of messages delivered to a peer"
    )
    .expect("Failed to create MESSAGES_ROUTED metric");

    pub static ref MESSAGES_QUEUED: IntCounter = register_int_counter!(
        "broker_messages_queued_total",
        "Total number of messages queued on pending channels"
    )
    .expect("Failed to create MESSAGES_QUEUED metric");

    pub static ref MESSAGES_DROPPED: IntCounter = register_int_counter!(
        "broker_messages_dropped_total",
        "Total number of messages posted to unknown ports"
    )
    .expect("Failed to create MESSAGES_DROPPED metric");

    pub static ref PENDING_CONNECTIONS: IntGauge = register_int_gauge!(
        "broker_pending_connections",
        "Connection requests suspended at a gate"
    )
    .expect("Failed to create PENDING_CONNECTIONS metric");

    pub static ref PORT_ID_WRAPS: IntCounter = register_int_counter!(
        "broker_port_id_wraps_total",
        "Times the port id sequence wrapped around"
    )
    .expect("Failed to create PORT_ID_WRAPS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_channel_opened() {
    CHANNELS_OPENED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_channel_closed(peer_notified: bool) {
    let label = if peer_notified { "true" } else { "false" };
    CHANNELS_CLOSED.with_label_values(&[label]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_connection_rejected(kind: &str) {
    CONNECTIONS_REJECTED.with_label_values(&[kind]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_message_routed() {
    MESSAGES_ROUTED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_message_queued() {
    MESSAGES_QUEUED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_message_dropped() {
    MESSAGES_DROPPED.inc();
}

#[cfg(feature = "metrics")]
pub fn set_pending_connections(count: usize) {
    PENDING_CONNECTIONS.set(i64::try_from(count).unwrap_or(i64::MAX));
}

#[cfg(feature = "metrics")]
pub fn record_port_id_wrap() {
    PORT_ID_WRAPS.inc();
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_channel_opened() {}

#[cfg(not(feature = "metrics"))]
pub fn record_channel_closed(_peer_notified: bool) {}

#[cfg(not(feature = "metrics"))]
pub fn record_connection_rejected(_kind: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_message_routed() {}

#[cfg(not(feature = "metrics"))]
pub fn record_message_queued() {}

#[cfg(not(feature = "metrics"))]
pub fn record_message_dropped() {}

#[cfg(not(feature = "metrics"))]
pub fn set_pending_connections(_count: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn record_port_id_wrap() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_never_panic() {
        record_channel_opened();
        record_channel_closed(true);
        record_channel_closed(false);
        record_connection_rejected("target_absent");
        record_message_routed();
        record_message_queued();
        record_message_dropped();
        set_pending_connections(3);
        record_port_id_wrap();
    }
}
