//! In-memory target registry and context directory.

use crate::domain::{ContextState, TargetDescriptor};
use crate::ports::{ContextDirectory, TargetRegistry};
use parking_lot::RwLock;
use shared_types::{ContextId, TargetId};
use std::collections::HashMap;

#[derive(Default)]
pub struct InMemoryTargetRegistry {
    targets: RwLock<HashMap<TargetId, TargetDescriptor>>,
}

impl InMemoryTargetRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace a target.
    pub fn install(&self, descriptor: TargetDescriptor) {
        self.targets.write().insert(descriptor.id.clone(), descriptor);
    }

    /// Remove a target. Returns whether it was installed.
    pub fn uninstall(&self, target: &TargetId) -> bool {
        self.targets.write().remove(target).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.read().is_empty()
    }
}

impl TargetRegistry for InMemoryTargetRegistry {
    fn lookup(&self, target: &TargetId) -> Option<TargetDescriptor> {
        self.targets.read().get(target).cloned()
    }
}

/// Contexts are live unless marked otherwise.
#[derive(Default)]
pub struct InMemoryContextDirectory {
    states: RwLock<HashMap<ContextId, ContextState>>,
}

impl InMemoryContextDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, context: ContextId, state: ContextState) {
        self.states.write().insert(context, state);
    }

    pub fn mark_gone(&self, context: ContextId) {
        self.set_state(context, ContextState::Gone);
    }

    pub fn mark_needs_reload(&self, context: ContextId) {
        self.set_state(context, ContextState::NeedsReload);
    }

    pub fn mark_live(&self, context: ContextId) {
        self.states.write().remove(&context);
    }
}

impl ContextDirectory for InMemoryContextDirectory {
    fn context_state(&self, context: ContextId) -> ContextState {
        self.states
            .read()
            .get(&context)
            .copied()
            .unwrap_or(ContextState::Live)
    }
}
