//! # Gate Rules
//!
//! Pure decision functions behind each negotiation gate. The service's gate
//! chain calls these in order and turns `Defer` into a provider call whose
//! answer comes back to the coordination loop later. Open and rejected are
//! outcomes of the chain, not stages a request waits in.
//!
//! ```text
//! PermissionCheck ─► AwaitingConsent ─► AwaitingSecret ─► AwaitingActivation ─► Open
//!        │                 │                  │                   │
//!        └─────────────────┴──────────────────┴───────────────────┴──► Rejected
//! ```

use crate::domain::entities::{PendingConnection, TargetDescriptor};
use crate::domain::errors::ConnectError;
use crate::domain::pending_queue::QueueBucket;
use serde::{Deserialize, Serialize};
use shared_types::{ContextId, SourceContext};

/// Where a connection request is in its negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GateStage {
    PermissionCheck,
    AwaitingConsent,
    AwaitingSecret,
    AwaitingActivation,
}

impl GateStage {
    /// Stages that may suspend a request, in evaluation order.
    pub const DEFERRABLE: [Self; 3] = [
        Self::AwaitingConsent,
        Self::AwaitingSecret,
        Self::AwaitingActivation,
    ];

    /// Queue bucket for messages posted while suspended at this stage.
    #[must_use]
    pub fn queue_bucket(self) -> Option<QueueBucket> {
        match self {
            Self::AwaitingConsent => Some(QueueBucket::AwaitingConsent),
            Self::AwaitingSecret => Some(QueueBucket::AwaitingSecret),
            Self::AwaitingActivation => Some(QueueBucket::AwaitingActivation),
            Self::PermissionCheck => None,
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::PermissionCheck => "permission_check",
            Self::AwaitingConsent => "awaiting_consent",
            Self::AwaitingSecret => "awaiting_secret",
            Self::AwaitingActivation => "awaiting_activation",
        }
    }
}

/// Verdict of a single gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Allow,
    Deny(ConnectError),
    /// Suspend until an asynchronous answer arrives.
    Defer(GateStage),
}

/// What the permission gate decided about a request it let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionGrant {
    pub is_web_connection: bool,
    /// Whether a requested secret should still be derived.
    pub keep_secret: bool,
}

/// Whether `source` may connect to `target` at all.
///
/// - Same identity: always allowed.
/// - Target declares external connectability: identified sources must be
///   listed by id, web pages must match a URL pattern. Web pages only keep a
///   secret request if the target accepts secrets.
/// - Otherwise any identified source is allowed and web pages are refused.
pub fn check_permission(
    source: &SourceContext,
    target: Option<&TargetDescriptor>,
    wants_secret: bool,
) -> Result<PermissionGrant, ConnectError> {
    let target = target.ok_or(ConnectError::TargetAbsent)?;

    if source.identity.as_ref() == Some(&target.id) {
        return Ok(PermissionGrant {
            is_web_connection: false,
            keep_secret: wants_secret,
        });
    }

    match (&target.externally_connectable, &source.identity) {
        (Some(connectable), Some(identity)) => {
            if connectable.allows_identity(identity) {
                Ok(PermissionGrant {
                    is_web_connection: false,
                    keep_secret: wants_secret,
                })
            } else {
                Err(ConnectError::TargetAbsent)
            }
        }
        (Some(connectable), None) => {
            let url_allowed = source
                .url
                .as_deref()
                .is_some_and(|url| connectable.allows_url(url));
            if !url_allowed {
                return Err(ConnectError::TargetAbsent);
            }
            Ok(PermissionGrant {
                is_web_connection: true,
                keep_secret: wants_secret && connectable.accepts_secret,
            })
        }
        (None, Some(_)) => Ok(PermissionGrant {
            is_web_connection: false,
            keep_secret: wants_secret,
        }),
        (None, None) => Err(ConnectError::TargetAbsent),
    }
}

/// Restricted-mode consent.
///
/// Only a web page in restricted mode connecting to a target that is not
/// enabled there, is not split-mode, and could not be enabled by the user
/// gets a prompt. Every other restricted-mode opener of a disabled target is
/// refused.
#[must_use]
pub fn check_consent(connection: &PendingConnection, target: &TargetDescriptor) -> GateOutcome {
    let support = target.restricted_mode;
    if !connection.source.restricted || support.enabled {
        return GateOutcome::Allow;
    }
    if !connection.is_web_connection || support.split_mode || support.can_be_enabled {
        return GateOutcome::Deny(ConnectError::TargetAbsent);
    }
    GateOutcome::Defer(GateStage::AwaitingConsent)
}

/// Secret derivation is needed when requested and not yet available.
#[must_use]
pub fn check_secret(connection: &PendingConnection) -> GateOutcome {
    if connection.wants_secret && connection.secret.is_none() {
        GateOutcome::Defer(GateStage::AwaitingSecret)
    } else {
        GateOutcome::Allow
    }
}

/// Where the receiving side of a target connection will come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationDecision {
    /// Already running in this context.
    Resident(ContextId),
    /// Not running but can be woken on demand.
    Activate,
    /// Not running and cannot be woken.
    Unavailable,
}

/// Decide the activation gate from the host's view of the target.
#[must_use]
pub fn decide_activation(resident: Option<ContextId>, supports_activation: bool) -> ActivationDecision {
    match (resident, supports_activation) {
        (Some(context), _) => ActivationDecision::Resident(context),
        (None, true) => ActivationDecision::Activate,
        (None, false) => ActivationDecision::Unavailable,
    }
}
