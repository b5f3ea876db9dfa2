//! # Shared Types Crate
//!
//! Entities that cross crate boundaries in the channel broker workspace.
//!
//! ## Design Principles
//!
//! - **Opaque handles**: execution contexts are plain numeric handles. The
//!   broker never learns what kind of process or page sits behind one.
//! - **Opaque payloads**: `Message::data` is carried verbatim and never
//!   parsed.
//! - **Single Source of Truth**: the bus events and the broker API both use
//!   these definitions.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
