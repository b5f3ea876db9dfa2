//! # Shared Bus - Event Bus for Lifecycle and Channel Notifications
//!
//! ## Roles
//!
//! - The host publishes `ContextTerminated` whenever an execution context
//!   goes away.
//! - The broker's lifecycle monitor subscribes to the lifecycle topic and
//!   turns those events into channel teardown.
//! - The broker publishes channel bookkeeping events for observers.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────────┐
//! │ Host process │                    │ LifecycleMonitor │
//! │  lifecycle   │    publish()       │   (broker)       │
//! │              │ ──────┐            │                  │
//! └──────────────┘       │            └──────────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐           │
//!                  │  Event Bus   │ ──────────┘
//!                  └──────────────┘  subscribe()
//! ```

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

pub use events::{BusEvent, EventFilter, EventTopic, TerminationCause};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events buffered per subscriber before it starts lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
