//! # Error Types
//!
//! Errors shared by more than one crate.

use thiserror::Error;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("Invalid value for {variable}: {value:?} ({reason})")]
    InvalidValue {
        variable: &'static str,
        value: String,
        reason: String,
    },

    /// A value parsed but is outside the accepted range.
    #[error("Value out of range for {variable}: {value} (expected {expected})")]
    OutOfRange {
        variable: &'static str,
        value: u64,
        expected: &'static str,
    },
}
