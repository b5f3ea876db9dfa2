//! # Channel Broker Test Suite
//!
//! Scenarios that cross crate boundaries: the broker driven through the
//! runtime, with context termination arriving over the shared bus.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # criterion benchmarks
//! └── src/
//!     ├── fixtures.rs   # runtime + in-memory environment harness
//!     └── integration/  # scenario tests
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p broker-tests
//! cargo test -p broker-tests integration::lifecycle
//! cargo bench -p broker-tests
//! ```

pub mod fixtures;
pub mod integration;
