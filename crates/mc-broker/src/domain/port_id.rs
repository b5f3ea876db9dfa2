//! # Port and Channel Identifiers
//!
//! A channel is a pair of ports. The opener always holds the even port and
//! the receiver the odd one, so either port yields the channel id and the
//! peer port with bit arithmetic alone:
//!
//! ```text
//! channel_id = port / 2
//! opener     = channel_id * 2       (even)
//! receiver   = channel_id * 2 + 1   (odd)
//! opposite   = port ^ 1
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Channel ids cycle through `[0, DEFAULT_CHANNEL_ID_PERIOD)` so that both
/// ports of every channel stay representable as a non-negative `i32`.
pub const DEFAULT_CHANNEL_ID_PERIOD: u32 = (i32::MAX / 2) as u32;

/// One endpoint of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(u32);

impl PortId {
    /// Wrap a raw port number.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw port number.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Channel this port belongs to.
    #[must_use]
    pub const fn channel_id(self) -> ChannelId {
        ChannelId(self.0 / 2)
    }

    /// Whether this is the opener side of its channel.
    #[must_use]
    pub const fn is_opener(self) -> bool {
        self.0 & 1 == 0
    }

    /// The other port of the same channel.
    #[must_use]
    pub const fn opposite(self) -> Self {
        Self(self.0 ^ 1)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A channel, identified by `port / 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(u32);

impl ChannelId {
    /// Wrap a raw channel number.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw channel number.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Even port held by the opener.
    #[must_use]
    pub const fn opener_port(self) -> PortId {
        PortId(self.0 * 2)
    }

    /// Odd port held by the receiver.
    #[must_use]
    pub const fn receiver_port(self) -> PortId {
        PortId(self.0 * 2 + 1)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out port pairs.
///
/// Safe to call from any thread: allocation is a single atomic increment, so
/// callers get their port id back without waiting for the broker loop.
#[derive(Debug)]
pub struct PortIdAllocator {
    next: AtomicU64,
    /// Number of times the sequence landed on channel 0, including the first.
    overflow: AtomicU64,
    period: u32,
}

impl PortIdAllocator {
    /// Allocator over the default channel id range.
    #[must_use]
    pub fn new() -> Self {
        Self::with_period(DEFAULT_CHANNEL_ID_PERIOD)
    }

    /// Allocator whose channel ids cycle through `[0, period)`.
    ///
    /// `period` is clamped to `[1, DEFAULT_CHANNEL_ID_PERIOD]`.
    #[must_use]
    pub fn with_period(period: u32) -> Self {
        Self {
            next: AtomicU64::new(0),
            overflow: AtomicU64::new(0),
            period: period.clamp(1, DEFAULT_CHANNEL_ID_PERIOD),
        }
    }

    /// Allocate a fresh `(opener, receiver)` pair.
    pub fn allocate_pair(&self) -> (PortId, PortId) {
        let sequence = self.next.fetch_add(1, Ordering::Relaxed);
        // period <= DEFAULT_CHANNEL_ID_PERIOD, so the remainder fits in u32
        let channel_id = ChannelId((sequence % u64::from(self.period)) as u32);

        if channel_id.raw() == 0 {
            let previous = self.overflow.fetch_add(1, Ordering::Relaxed);
            if previous > 0 {
                warn!(
                    wraps = previous,
                    period = self.period,
                    "Port id sequence wrapped; ids are being reused"
                );
                crate::metrics::record_port_id_wrap();
            }
        }

        let opener = channel_id.opener_port();
        let receiver = channel_id.receiver_port();
        debug_assert!(opener.is_opener() && !receiver.is_opener());
        debug_assert_eq!(opener.opposite(), receiver);
        (opener, receiver)
    }

    /// How many times the sequence has wrapped back to channel 0.
    #[must_use]
    pub fn wrap_count(&self) -> u64 {
        self.overflow.load(Ordering::Relaxed).saturating_sub(1)
    }

    /// Total pairs handed out.
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }

    /// Channel id period.
    #[must_use]
    pub fn period(&self) -> u32 {
        self.period
    }
}

impl Default for PortIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
