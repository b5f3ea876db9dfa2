//! Domain layer: identifiers, entities, bookkeeping stores and gate rules.
//! Nothing here talks to a provider or the runtime.

pub mod channel_table;
pub mod config;
pub mod entities;
pub mod errors;
pub mod gate_rules;
pub mod native_policy;
pub mod pending_queue;
pub mod port_id;
pub mod url_pattern;

pub use channel_table::{ChannelTable, ClosedChannel, TerminationClose};
pub use config::{BrokerConfig, DEFAULT_ACTIVATION_TIMEOUT};
pub use entities::*;
pub use errors::*;
pub use gate_rules::{
    check_consent, check_permission, check_secret, decide_activation, ActivationDecision,
    GateOutcome, GateStage, PermissionGrant,
};
pub use native_policy::{NativeHostPolicy, PolicyPermission};
pub use pending_queue::{PendingQueueStore, QueueBucket};
pub use port_id::{ChannelId, PortId, PortIdAllocator, DEFAULT_CHANNEL_ID_PERIOD};
pub use url_pattern::{UrlPattern, UrlPatternError};
