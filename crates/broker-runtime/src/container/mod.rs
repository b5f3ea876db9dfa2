//! # Runtime Container
//!
//! Configuration for everything the runtime wires together.

pub mod config;

pub use config::{RuntimeConfig, DEFAULT_SHUTDOWN_GRACE};
pub use shared_types::ConfigError;
