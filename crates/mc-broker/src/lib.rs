//! # Message Channel Broker
//!
//! Opens duplex message channels between execution contexts, routes
//! messages over them and tears them down when either side closes or its
//! hosting context dies.
//!
//! ## Channel Lifecycle
//!
//! ```text
//! open_channel ──► PermissionCheck ──► AwaitingConsent ──► AwaitingSecret ──► AwaitingActivation ──► Open ──► Closed
//!                        │                   │                   │                    │
//!                        └───────────────────┴───────────────────┴────────────────────┴──► Rejected
//! ```
//!
//! The caller gets its opener port back immediately. Messages posted while
//! the channel negotiates are queued per channel and delivered in order right
//! after the receiver's `OnConnect`.
//!
//! ## Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Opener port even, receiver port odd, `peer = port ^ 1` | `domain/port_id.rs` - `PortIdAllocator::allocate_pair()` |
//! | At most one open channel per id | `domain/channel_table.rs` - `ChannelTable::open()` |
//! | Queue lives in exactly one bucket | `domain/pending_queue.rs` - `PendingQueueStore` |
//! | Gates evaluated in order, never re-run | `service/gate_chain.rs` - `GateChain::advance()` |
//! | One keep-alive reference per endpoint per open channel | `domain/channel_table.rs` - keep-alive ledger |
//! | All state mutated on one task | `service/core.rs` - `BrokerCore::run()` |
//!
//! ## Rejections
//!
//! | Kind | Opener sees |
//! |------|-------------|
//! | `TargetAbsent`, `ConsentDenied`, `SecretDerivationFailed` | `Could not establish connection. Receiving end does not exist.` |
//! | `MissingPermission` | `Access to native messaging requires nativeMessaging permission.` |
//! | `PolicyProhibited` | `Access to the native messaging host was disabled by the system administrator.` |
//! | `NativeHostLaunchFailed` | launcher's message |
//! | `TargetActivationAbandoned` | nothing |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/  - in-memory providers, recording dispatcher         │
//! │  lifecycle  - LifecycleMonitor (shared-bus subscriber)          │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - MessageBrokerApi                           │
//! │  ports/outbound.rs - EndpointDispatcher, TargetRegistry, ...    │
//! │  service/          - coordination loop, gate chain, router      │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/port_id.rs       - PortId, ChannelId, PortIdAllocator   │
//! │  domain/entities.rs      - Channel, PendingConnection, ...      │
//! │  domain/pending_queue.rs - PendingQueueStore                    │
//! │  domain/channel_table.rs - ChannelTable + keep-alive ledger     │
//! │  domain/gate_rules.rs    - permission / consent / secret rules  │
//! │  domain/native_policy.rs - native host blocklist policy         │
//! │  domain/url_pattern.rs   - externally connectable URL patterns  │
//! │  domain/errors.rs        - ConnectError, BrokerError            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod lifecycle;
pub mod metrics;
pub mod ports;
pub mod service;

pub use domain::*;
pub use lifecycle::LifecycleMonitor;
pub use ports::*;
pub use service::{BrokerHandle, BrokerPorts, BrokerService};
