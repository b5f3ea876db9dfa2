//! In-memory native host launcher.

use crate::ports::{NativeHostLauncher, NativeLaunchRequest};
use parking_lot::{Mutex, RwLock};
use shared_types::{ContextId, TargetId};
use std::collections::{HashMap, HashSet};

/// Launch failure for a host that is not installed.
pub const HOST_NOT_FOUND: &str = "Specified native messaging host not found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InstalledHost {
    context: ContextId,
    user_level: bool,
}

#[derive(Default)]
pub struct InMemoryNativeHosts {
    permitted: RwLock<HashSet<TargetId>>,
    hosts: RwLock<HashMap<String, InstalledHost>>,
    launches: Mutex<Vec<NativeLaunchRequest>>,
}

impl InMemoryNativeHosts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `identity` native messaging permission.
    pub fn grant_permission(&self, identity: impl Into<TargetId>) {
        self.permitted.write().insert(identity.into());
    }

    /// Install a system-level host whose process runs as `context`.
    pub fn install_system_host(&self, name: impl Into<String>, context: ContextId) {
        self.install(name.into(), context, false);
    }

    /// Install a user-level host whose process runs as `context`.
    pub fn install_user_host(&self, name: impl Into<String>, context: ContextId) {
        self.install(name.into(), context, true);
    }

    /// Every launch request received, in order.
    #[must_use]
    pub fn launches(&self) -> Vec<NativeLaunchRequest> {
        self.launches.lock().clone()
    }

    fn install(&self, name: String, context: ContextId, user_level: bool) {
        self.hosts
            .write()
            .insert(name, InstalledHost { context, user_level });
    }
}

impl NativeHostLauncher for InMemoryNativeHosts {
    fn has_native_messaging_permission(&self, identity: &TargetId) -> bool {
        self.permitted.read().contains(identity)
    }

    fn launch(&self, request: &NativeLaunchRequest) -> Result<ContextId, String> {
        self.launches.lock().push(request.clone());
        match self.hosts.read().get(&request.host_name) {
            Some(host) if !host.user_level || request.allow_user_level => Ok(host.context),
            _ => Err(HOST_NOT_FOUND.to_string()),
        }
    }
}
