//! # Broker Error Types
//!
//! Two families:
//!
//! - [`ConnectError`]: why a connection request was refused. These never
//!   surface to the caller of `open_channel`; the opener learns about them
//!   through a disconnect carrying [`ConnectError::disconnect_reason`].
//! - [`BrokerError`]: failures of the broker itself (bookkeeping violations,
//!   a dead coordination loop).

use crate::domain::pending_queue::QueueBucket;
use crate::domain::port_id::{ChannelId, PortId};
use thiserror::Error;

/// Reason delivered when the target is missing or refused the connection.
///
/// Consent and secret failures reuse it so an opener cannot tell a refusing
/// target from an absent one.
pub const RECEIVING_END_MISSING: &str =
    "Could not establish connection. Receiving end does not exist.";

/// Reason delivered when the opener lacks native messaging permission.
pub const MISSING_NATIVE_PERMISSION: &str =
    "Access to native messaging requires nativeMessaging permission.";

/// Reason delivered when administrator policy forbids the native host.
pub const NATIVE_HOST_PROHIBITED: &str =
    "Access to the native messaging host was disabled by the system administrator.";

/// Why a connection request did not produce an open channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// No such target, or the target does not accept this opener.
    #[error("Receiving end does not exist")]
    TargetAbsent,

    /// The user refused the restricted-mode consent prompt.
    #[error("User denied restricted-mode access")]
    ConsentDenied,

    /// Administrator policy forbids the native host.
    #[error("Native host prohibited by policy")]
    PolicyProhibited,

    /// The opener lacks native messaging permission.
    #[error("Missing native messaging permission")]
    MissingPermission,

    /// The native host could not be started.
    #[error("Native host launch failed: {0}")]
    NativeHostLaunchFailed(String),

    /// Channel-binding secret derivation failed.
    #[error("Secret derivation failed: {0}")]
    SecretDerivationFailed(String),

    /// The target could not be activated, or the opener went away while it
    /// was activating. Never reported to the opener.
    #[error("Target activation abandoned")]
    TargetActivationAbandoned,
}

impl ConnectError {
    /// Reason string for the opener's `OnDisconnect`, or `None` when the
    /// rejection is silent.
    #[must_use]
    pub fn disconnect_reason(&self) -> Option<String> {
        match self {
            Self::TargetAbsent | Self::ConsentDenied | Self::SecretDerivationFailed(_) => {
                Some(RECEIVING_END_MISSING.to_string())
            }
            Self::PolicyProhibited => Some(NATIVE_HOST_PROHIBITED.to_string()),
            Self::MissingPermission => Some(MISSING_NATIVE_PERMISSION.to_string()),
            Self::NativeHostLaunchFailed(reason) => Some(reason.clone()),
            Self::TargetActivationAbandoned => None,
        }
    }

    /// Whether the opener is left without a disconnect.
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.disconnect_reason().is_none()
    }

    /// Stable label for logs, metrics and bus events.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::TargetAbsent => "target_absent",
            Self::ConsentDenied => "consent_denied",
            Self::PolicyProhibited => "policy_prohibited",
            Self::MissingPermission => "missing_permission",
            Self::NativeHostLaunchFailed(_) => "native_host_launch_failed",
            Self::SecretDerivationFailed(_) => "secret_derivation_failed",
            Self::TargetActivationAbandoned => "target_activation_abandoned",
        }
    }
}

/// Pending queue bookkeeping errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The channel has no pending queue.
    #[error("Channel {0} has no pending queue")]
    NotPending(ChannelId),

    /// The channel already has a pending queue.
    #[error("Channel {channel_id} already queued in {bucket:?}")]
    AlreadyPending {
        channel_id: ChannelId,
        bucket: QueueBucket,
    },

    /// The queue lives in a different bucket than the caller expected.
    #[error("Channel {channel_id} queued in {actual:?}, expected {expected:?}")]
    BucketMismatch {
        channel_id: ChannelId,
        expected: QueueBucket,
        actual: QueueBucket,
    },
}

/// Broker-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Two channels were opened with the same id.
    #[error("Channel {0} is already open")]
    ChannelAlreadyOpen(ChannelId),

    /// The port is not part of any open or pending channel.
    #[error("Unknown port id: {0}")]
    UnknownPortId(PortId),

    /// Pending queue invariant violated.
    #[error("Pending queue error: {0}")]
    Queue(#[from] QueueError),

    /// The coordination loop has stopped.
    #[error("Broker loop is closed")]
    LoopClosed,
}
