//! Platform abstraction: the state store and actuation layer a link drives.

use crate::error::LinkResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use twinsync_model::{ActionRequest, EntityId, EntityState};

/// Callback fired for every state change of a subscribed entity.
///
/// Receives the previous snapshot (if any) and the new one. Implementations
/// must not hold internal locks while calling it.
pub type StateCallback = Arc<dyn Fn(Option<EntityState>, EntityState) + Send + Sync>;

/// Opaque handle returned by [`Platform::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// The host a link runs against.
///
/// This trait abstracts the home-automation platform, allowing for different
/// implementations (a live state machine, an in-memory store for tests, a
/// recorded trace for simulation).
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    /// Returns the current state of an entity, or `None` if it does not resolve.
    fn get_state(&self, entity_id: &EntityId) -> Option<EntityState>;

    /// Subscribes to state changes of an entity.
    fn subscribe(&self, entity_id: &EntityId, callback: StateCallback) -> SubscriptionHandle;

    /// Cancels a subscription. Unknown handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Asks the external executor to perform an action.
    ///
    /// Failures are reported as [`LinkError::ActionInvocationFailed`](crate::LinkError::ActionInvocationFailed)
    /// or [`LinkError::EntityNotFound`](crate::LinkError::EntityNotFound).
    async fn invoke_action(&self, request: &ActionRequest) -> LinkResult<()>;
}
