//! In-memory providers for the asynchronous gates.
//!
//! Each provider either answers at once from a configured value or parks the
//! request on a [`ManualGate`] until the test (or demo) releases it. A value
//! released before anyone waits is kept for the next waiter.

use crate::ports::{ActivationProvider, ConsentPrompt, ConsentRequest, SecretProvider, SecretRequest};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use shared_types::{ContextId, TargetId};
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use tokio::sync::oneshot;
use tracing::debug;

/// Keyed rendezvous between a waiting provider call and whoever answers it.
pub struct ManualGate<K, V> {
    state: Mutex<GateState<K, V>>,
}

struct GateState<K, V> {
    waiting: HashMap<K, VecDeque<oneshot::Sender<V>>>,
    ready: HashMap<K, VecDeque<V>>,
    requests: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone, V> ManualGate<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                waiting: HashMap::new(),
                ready: HashMap::new(),
                requests: HashMap::new(),
            }),
        }
    }

    /// Wait for the next value released under `key`.
    ///
    /// `None` if the gate is dropped while waiting.
    pub async fn wait(&self, key: K) -> Option<V> {
        let receiver = {
            let mut state = self.state.lock();
            *state.requests.entry(key.clone()).or_insert(0) += 1;
            if let Some(value) = state.ready.get_mut(&key).and_then(VecDeque::pop_front) {
                return Some(value);
            }
            let (sender, receiver) = oneshot::channel();
            state.waiting.entry(key).or_default().push_back(sender);
            receiver
        };
        receiver.await.ok()
    }

    /// Answer the oldest waiter on `key`, or keep `value` for the next one.
    pub fn release(&self, key: K, value: V) {
        let mut state = self.state.lock();
        let mut value = value;
        if let Some(waiters) = state.waiting.get_mut(&key) {
            while let Some(sender) = waiters.pop_front() {
                match sender.send(value) {
                    Ok(()) => return,
                    // waiter went away, try the next one
                    Err(returned) => value = returned,
                }
            }
        }
        state.ready.entry(key).or_default().push_back(value);
    }

    /// Calls currently parked on `key`.
    #[must_use]
    pub fn waiting(&self, key: &K) -> usize {
        self.state
            .lock()
            .waiting
            .get(key)
            .map_or(0, |w| w.iter().filter(|s| !s.is_closed()).count())
    }

    /// Total calls ever made for `key`.
    #[must_use]
    pub fn requests(&self, key: &K) -> usize {
        self.state.lock().requests.get(key).copied().unwrap_or(0)
    }
}

impl<K: Eq + Hash + Clone, V> Default for ManualGate<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// CONSENT
// =============================================================================

/// Consent prompt keyed by target.
pub struct InMemoryConsent {
    automatic: RwLock<Option<bool>>,
    gate: ManualGate<TargetId, bool>,
}

impl InMemoryConsent {
    /// Every prompt waits for [`InMemoryConsent::answer`].
    #[must_use]
    pub fn manual() -> Self {
        Self {
            automatic: RwLock::new(None),
            gate: ManualGate::new(),
        }
    }

    /// Every prompt is answered with `allow` at once.
    #[must_use]
    pub fn automatic(allow: bool) -> Self {
        Self {
            automatic: RwLock::new(Some(allow)),
            gate: ManualGate::new(),
        }
    }

    /// Answer a prompt for `target`.
    pub fn answer(&self, target: &TargetId, allow: bool) {
        self.gate.release(target.clone(), allow);
    }

    #[must_use]
    pub fn prompts(&self, target: &TargetId) -> usize {
        self.gate.requests(target)
    }
}

#[async_trait]
impl ConsentPrompt for InMemoryConsent {
    async fn request_consent(&self, request: ConsentRequest) -> bool {
        debug!(target = %request.target, context = %request.source_context, "Consent prompt");
        let automatic = *self.automatic.read();
        match automatic {
            Some(allow) => {
                self.gate.release(request.target.clone(), allow);
                self.gate.wait(request.target).await.unwrap_or(false)
            }
            None => self.gate.wait(request.target).await.unwrap_or(false),
        }
    }
}

// =============================================================================
// SECRETS
// =============================================================================

/// Secrets keyed by source URL, answered at once.
///
/// URLs without a configured entry get a secret derived from the URL itself
/// unless failures are the default.
#[derive(Default)]
pub struct InMemorySecrets {
    entries: RwLock<HashMap<String, Result<String, String>>>,
    fail_unknown: bool,
}

impl InMemorySecrets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail derivation for every URL without an entry.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            fail_unknown: true,
        }
    }

    pub fn set_secret(&self, url: impl Into<String>, secret: impl Into<String>) {
        self.entries.write().insert(url.into(), Ok(secret.into()));
    }

    pub fn set_failure(&self, url: impl Into<String>, reason: impl Into<String>) {
        self.entries.write().insert(url.into(), Err(reason.into()));
    }
}

#[async_trait]
impl SecretProvider for InMemorySecrets {
    async fn derive_secret(&self, request: SecretRequest) -> Result<String, String> {
        let url = request
            .source_url
            .ok_or_else(|| "source has no URL".to_string())?;
        if let Some(entry) = self.entries.read().get(&url) {
            return entry.clone();
        }
        if self.fail_unknown {
            Err(format!("no secret for {url}"))
        } else {
            Ok(format!("secret:{url}"))
        }
    }
}

// =============================================================================
// ACTIVATION
// =============================================================================

/// Resident contexts plus manually completed activations.
#[derive(Default)]
pub struct InMemoryActivation {
    resident: RwLock<HashMap<TargetId, ContextId>>,
    activatable: RwLock<HashSet<TargetId>>,
    gate: ManualGate<TargetId, Option<ContextId>>,
}

impl InMemoryActivation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `target` is running in `context`.
    pub fn set_resident(&self, target: impl Into<TargetId>, context: ContextId) {
        self.resident.write().insert(target.into(), context);
    }

    /// `target` stopped running.
    pub fn clear_resident(&self, target: &TargetId) {
        self.resident.write().remove(target);
    }

    /// `target` can be started on demand.
    pub fn enable_activation(&self, target: impl Into<TargetId>) {
        self.activatable.write().insert(target.into());
    }

    /// Finish an activation of `target`. `Some` also marks it resident.
    pub fn complete(&self, target: &TargetId, host: Option<ContextId>) {
        if let Some(context) = host {
            self.resident.write().insert(target.clone(), context);
        }
        self.gate.release(target.clone(), host);
    }

    /// Activation calls made for `target`.
    #[must_use]
    pub fn activations(&self, target: &TargetId) -> usize {
        self.gate.requests(target)
    }

    /// Activation calls currently waiting for `target`.
    #[must_use]
    pub fn waiting(&self, target: &TargetId) -> usize {
        self.gate.waiting(target)
    }
}

#[async_trait]
impl ActivationProvider for InMemoryActivation {
    fn resident_context(&self, target: &TargetId) -> Option<ContextId> {
        self.resident.read().get(target).copied()
    }

    fn supports_activation(&self, target: &TargetId) -> bool {
        self.activatable.read().contains(target)
    }

    async fn activate(&self, target: &TargetId) -> Option<ContextId> {
        debug!(target = %target, "Activating target");
        self.gate.wait(target.clone()).await.flatten()
    }
}
