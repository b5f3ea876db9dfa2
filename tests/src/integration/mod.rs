//! # Integration Scenarios
//!
//! - `properties`: the broker's guarantees checked end to end
//! - `lifecycle`: teardown driven by termination events on the bus
//! - `ordering`: many channels and callers at once

pub mod lifecycle;
pub mod ordering;
pub mod properties;
