//! Change events delivered by subscriptions.

use crate::direction::{Direction, Side};
use tokio::time::Instant;
use twinsync_model::{EntityId, EntityState};

/// One observed state change on one side of a link.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Side the change happened on.
    pub side: Side,
    /// Entity that changed.
    pub entity_id: EntityId,
    /// Previous snapshot, absent for the first report.
    pub old: Option<EntityState>,
    /// New snapshot.
    pub new: EntityState,
    /// When the callback fired.
    pub observed_at: Instant,
}

impl ChangeEvent {
    /// Creates an event stamped with the current time.
    pub fn new(side: Side, old: Option<EntityState>, new: EntityState) -> Self {
        Self {
            side,
            entity_id: new.entity_id.clone(),
            old,
            new,
            observed_at: Instant::now(),
        }
    }

    /// Direction the change would be mirrored in.
    pub fn direction(&self) -> Direction {
        self.side.outbound()
    }

    /// Returns true if the entity just came back from being unavailable.
    pub fn is_recovery(&self) -> bool {
        self.old.as_ref().is_some_and(EntityState::is_unavailable) && !self.new.is_unavailable()
    }
}
