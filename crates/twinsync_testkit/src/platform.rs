//! In-memory platform.
//!
//! Holds entity states, fans changes out to subscribers, records every
//! invoked action and can inject failures. With auto-apply on, an accepted
//! action updates the target state and notifies subscribers, like a real
//! device confirming the command.

use crate::device::apply_action;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use twinsync_engine::{LinkError, LinkResult, Platform, StateCallback, SubscriptionHandle};
use twinsync_model::{ActionRequest, EntityId, EntityState};

#[derive(Default)]
struct Inner {
    states: HashMap<EntityId, EntityState>,
    subscriptions: HashMap<u64, (EntityId, StateCallback)>,
    invocations: Vec<ActionRequest>,
    failures: HashMap<EntityId, u32>,
    latency: Duration,
    subscribe_calls: u64,
    unsubscribe_calls: u64,
}

/// A [`Platform`] backed by a hash map.
pub struct MemoryPlatform {
    inner: Mutex<Inner>,
    auto_apply: AtomicBool,
    next_handle: AtomicU64,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPlatform {
    /// Creates an empty platform with auto-apply on.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            auto_apply: AtomicBool::new(true),
            next_handle: AtomicU64::new(1),
        }
    }

    /// Creates a platform seeded with states.
    pub fn with_states(states: impl IntoIterator<Item = EntityState>) -> Self {
        let platform = Self::new();
        for state in states {
            platform.insert(state);
        }
        platform
    }

    /// Turns simulated device confirmation on or off.
    pub fn set_auto_apply(&self, enabled: bool) {
        self.auto_apply.store(enabled, Ordering::SeqCst);
    }

    /// Delays every invocation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    /// Stores a state without notifying anyone.
    pub fn insert(&self, state: EntityState) {
        self.inner.lock().states.insert(state.entity_id.clone(), state);
    }

    /// Stores a state and notifies the entity's subscribers.
    pub fn set_state(&self, state: EntityState) {
        let (old, callbacks) = {
            let mut inner = self.inner.lock();
            let old = inner.states.insert(state.entity_id.clone(), state.clone());
            let callbacks: Vec<StateCallback> = inner
                .subscriptions
                .values()
                .filter(|(id, _)| *id == state.entity_id)
                .map(|(_, cb)| cb.clone())
                .collect();
            (old, callbacks)
        };
        for callback in callbacks {
            callback(old.clone(), state.clone());
        }
    }

    /// Removes an entity so it no longer resolves.
    pub fn remove(&self, entity_id: &EntityId) -> Option<EntityState> {
        self.inner.lock().states.remove(entity_id)
    }

    /// Returns the stored state of an entity.
    pub fn state(&self, entity_id: &str) -> Option<EntityState> {
        self.inner.lock().states.get(&EntityId::new(entity_id)).cloned()
    }

    /// Makes the next `count` invocations on an entity fail.
    pub fn fail_next(&self, entity_id: &str, count: u32) {
        self.inner
            .lock()
            .failures
            .insert(EntityId::new(entity_id), count);
    }

    /// Returns every invocation so far.
    pub fn invocations(&self) -> Vec<ActionRequest> {
        self.inner.lock().invocations.clone()
    }

    /// Returns the invocations that targeted one entity.
    pub fn invocations_for(&self, entity_id: &str) -> Vec<ActionRequest> {
        let id = EntityId::new(entity_id);
        self.inner
            .lock()
            .invocations
            .iter()
            .filter(|request| request.entity_id == id)
            .cloned()
            .collect()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions.len()
    }

    /// Total `subscribe` calls.
    pub fn subscribe_calls(&self) -> u64 {
        self.inner.lock().subscribe_calls
    }

    /// Total `unsubscribe` calls.
    pub fn unsubscribe_calls(&self) -> u64 {
        self.inner.lock().unsubscribe_calls
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    fn get_state(&self, entity_id: &EntityId) -> Option<EntityState> {
        self.inner.lock().states.get(entity_id).cloned()
    }

    fn subscribe(&self, entity_id: &EntityId, callback: StateCallback) -> SubscriptionHandle {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.subscribe_calls += 1;
        inner
            .subscriptions
            .insert(handle, (entity_id.clone(), callback));
        SubscriptionHandle(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock();
        inner.unsubscribe_calls += 1;
        inner.subscriptions.remove(&handle.0);
    }

    async fn invoke_action(&self, request: &ActionRequest) -> LinkResult<()> {
        let latency = self.inner.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let next = {
            let mut inner = self.inner.lock();
            inner.invocations.push(request.clone());

            if let Some(remaining) = inner.failures.get_mut(&request.entity_id) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(LinkError::invocation(
                        request.entity_id.clone(),
                        request.action.clone(),
                        "injected failure",
                    ));
                }
            }

            let Some(current) = inner.states.get(&request.entity_id) else {
                return Err(LinkError::EntityNotFound(request.entity_id.clone()));
            };
            apply_action(current, request)
        };
        tracing::debug!(%request, "memory platform invoked");

        if self.auto_apply.load(Ordering::SeqCst) {
            self.set_state(next);
        }
        Ok(())
    }
}
