//! Ports layer.

pub mod inbound;
pub mod outbound;

pub use inbound::MessageBrokerApi;
pub use outbound::*;
