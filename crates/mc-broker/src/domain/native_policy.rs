//! Administrator policy for native messaging hosts.

use serde::{Deserialize, Serialize};

/// Wildcard entry matching every host name in the blocklist.
pub const BLOCK_ALL: &str = "*";

/// Outcome of a policy lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyPermission {
    /// Any installed host may be launched.
    AllowAll,
    /// Only system-level hosts may be launched.
    AllowSystemOnly,
    Disallow,
}

/// Blocklist / allowlist / user-level policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeHostPolicy {
    /// Host names that may not be launched. `"*"` blocks every host.
    pub blocklist: Vec<String>,
    /// Host names exempt from the blocklist.
    pub allowlist: Vec<String>,
    /// `Some(false)` restricts launches to system-level hosts.
    pub user_level_hosts: Option<bool>,
}

impl NativeHostPolicy {
    /// Evaluate the policy for `host_name`.
    #[must_use]
    pub fn evaluate(&self, host_name: &str) -> PolicyPermission {
        let allowed = if self.user_level_hosts == Some(false) {
            PolicyPermission::AllowSystemOnly
        } else {
            PolicyPermission::AllowAll
        };

        let blocked = self
            .blocklist
            .iter()
            .any(|entry| entry == BLOCK_ALL || entry == host_name);
        if !blocked {
            return allowed;
        }

        if self.allowlist.iter().any(|entry| entry == host_name) {
            allowed
        } else {
            PolicyPermission::Disallow
        }
    }
}
