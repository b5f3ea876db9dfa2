//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Contexts**: `ContextId`, `SourceContext`
//! - **Identities**: `TargetId`
//! - **Origins**: `TabDescriptor`, `OriginDescriptor`
//! - **Payloads**: `Message`

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: CONTEXTS
// =============================================================================

/// Handle of an external execution context (a renderer process, a tab's
/// main frame host, a native host process).
///
/// The broker compares handles for equality and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

// =============================================================================
// CLUSTER B: IDENTITIES
// =============================================================================

/// Identity of a connectable target (an extension id, an app id).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub String);

impl TargetId {
    /// Create a target identity from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identity string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// =============================================================================
// CLUSTER C: ORIGINS
// =============================================================================

/// Tab the opener lives in, when it lives in a tab at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabDescriptor {
    /// Tab identifier as known to the host.
    pub tab_id: i32,
    /// Window that owns the tab.
    pub window_id: i32,
    /// Committed URL of the tab, if known.
    pub url: Option<String>,
}

/// Where a connection request came from.
///
/// `frame_id` is `Some(0)` for a main frame, the frame routing id for a
/// sub-frame, and `None` when the opener is not hosted in a tab.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OriginDescriptor {
    /// Tab of the opener.
    pub tab: Option<TabDescriptor>,
    /// Frame of the opener inside `tab`.
    pub frame_id: Option<u32>,
}

impl OriginDescriptor {
    /// Descriptor for an opener that is not hosted in a tab.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Descriptor for an opener hosted in `tab` at `frame_id`.
    #[must_use]
    pub fn in_tab(tab: TabDescriptor, frame_id: u32) -> Self {
        Self {
            tab: Some(tab),
            frame_id: Some(frame_id),
        }
    }
}

/// Everything the broker knows about the context that asked for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContext {
    /// Context hosting the opener endpoint.
    pub context: ContextId,
    /// Identity of the opener. `None` means a plain web page.
    pub identity: Option<TargetId>,
    /// URL of the opener document.
    pub url: Option<String>,
    /// Tab/frame descriptor of the opener.
    pub origin: OriginDescriptor,
    /// Whether the opener runs in a restricted (private) browsing mode.
    pub restricted: bool,
}

impl SourceContext {
    /// Source that is an identified extension context.
    pub fn identity(context: ContextId, identity: impl Into<String>) -> Self {
        Self {
            context,
            identity: Some(TargetId::new(identity)),
            url: None,
            origin: OriginDescriptor::detached(),
            restricted: false,
        }
    }

    /// Source that is a web page at `url`.
    pub fn web_page(context: ContextId, url: impl Into<String>) -> Self {
        Self {
            context,
            identity: None,
            url: Some(url.into()),
            origin: OriginDescriptor::detached(),
            restricted: false,
        }
    }

    /// Mark this source as running in restricted mode.
    #[must_use]
    pub fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }

    /// Attach the URL of the opener document.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Attach a tab/frame descriptor.
    #[must_use]
    pub fn with_origin(mut self, origin: OriginDescriptor) -> Self {
        self.origin = origin;
        self
    }

    /// Whether the source is a web page rather than an identified context.
    #[must_use]
    pub fn is_web_page(&self) -> bool {
        self.identity.is_none()
    }
}

// =============================================================================
// CLUSTER D: PAYLOADS
// =============================================================================

/// A message travelling over a channel. Never inspected by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Serialized payload, usually JSON produced by the sender.
    pub data: String,
    /// Whether the send happened while handling a user gesture.
    pub user_gesture: bool,
}

impl Message {
    /// Message without a user gesture.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            user_gesture: false,
        }
    }

    /// Message sent while handling a user gesture.
    pub fn with_gesture(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            user_gesture: true,
        }
    }
}
