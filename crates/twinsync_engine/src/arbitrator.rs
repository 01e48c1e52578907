//! Master/slave arbitration for progressive mirrors.
//!
//! Each direction has one [`ActionState`] slot. A progressive change on the
//! source claims the slot as master and bumps the slot's generation; a task
//! holding an older generation is superseded and must leave the slot alone
//! when it wakes up or returns from the platform.
//!
//! ```text
//! Idle --begin--> Starting --mark_in_progress--> InProgress
//!   ^                |                               |
//!   +---- cancel / finish / observed / timeout ------+
//! ```

use crate::config::ProgressiveMode;
use crate::direction::Direction;
use crate::schema::ToleranceTable;
use crate::transition::TransitionKind;
use crate::translator::ExpectedState;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use twinsync_model::{EntityId, EntityState};

/// Phase of a progressive mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPhase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Task created, waiting for the burst to settle.
    Starting,
    /// Action sent, waiting for the slave to arrive.
    InProgress,
}

/// In-flight progressive mirror for one direction.
#[derive(Debug, Clone, Default)]
pub struct ActionState {
    /// Current phase.
    pub phase: ActionPhase,
    /// Entity leading the burst.
    pub master: Option<EntityId>,
    /// State the slave is being driven to.
    pub target: Option<ExpectedState>,
    /// When the current phase started.
    pub started_at: Option<Instant>,
    /// Bumped on every begin and cancel.
    pub generation: u64,
}

impl ActionState {
    fn clear(&mut self) {
        self.phase = ActionPhase::Idle;
        self.master = None;
        self.target = None;
        self.started_at = None;
    }
}

/// What the arbitrator makes of a change on a possible slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Not related to an in-flight mirror.
    Pass,
    /// The slave reached its target; the mirror is complete.
    Completed,
    /// The slave is still following its master.
    Following,
}

/// Per-link progressive arbitration.
#[derive(Debug)]
pub struct Arbitrator {
    mode: ProgressiveMode,
    action_timeout: Duration,
    tolerances: ToleranceTable,
    slots: [ActionState; 2],
}

impl Arbitrator {
    /// Creates an arbitrator with both directions idle.
    pub fn new(mode: ProgressiveMode, action_timeout: Duration, tolerances: ToleranceTable) -> Self {
        Self {
            mode,
            action_timeout,
            tolerances,
            slots: Default::default(),
        }
    }

    /// Claims `direction` for `master`, superseding any task already there.
    ///
    /// Returns the generation the new task must present later.
    pub fn begin(&mut self, direction: Direction, master: EntityId, now: Instant) -> u64 {
        let slot = &mut self.slots[direction.index()];
        if slot.phase != ActionPhase::Idle {
            debug!(%direction, generation = slot.generation, "superseding progressive mirror");
        }
        slot.generation += 1;
        slot.phase = ActionPhase::Starting;
        slot.master = Some(master);
        slot.target = None;
        slot.started_at = Some(now);
        slot.generation
    }

    /// Returns true if `generation` still owns `direction`.
    pub fn is_current(&self, direction: Direction, generation: u64) -> bool {
        let slot = &self.slots[direction.index()];
        slot.generation == generation && slot.phase != ActionPhase::Idle
    }

    /// Returns true if `direction` has a mirror pending or in flight.
    pub fn is_busy(&self, direction: Direction) -> bool {
        self.slots[direction.index()].phase != ActionPhase::Idle
    }

    /// Moves a current task to `InProgress` with the target it is sending.
    pub fn mark_in_progress(
        &mut self,
        direction: Direction,
        generation: u64,
        target: ExpectedState,
        now: Instant,
    ) -> bool {
        if !self.is_current(direction, generation) {
            return false;
        }
        let slot = &mut self.slots[direction.index()];
        slot.phase = ActionPhase::InProgress;
        slot.target = Some(target);
        slot.started_at = Some(now);
        true
    }

    /// Returns a current task's slot to `Idle`.
    pub fn finish(&mut self, direction: Direction, generation: u64) -> bool {
        if !self.is_current(direction, generation) {
            return false;
        }
        self.slots[direction.index()].clear();
        true
    }

    /// Force-resets a task stuck `InProgress` past the action timeout.
    pub fn reap(&mut self, direction: Direction, generation: u64, now: Instant) -> bool {
        if !self.is_current(direction, generation) || !self.timed_out(direction, now) {
            return false;
        }
        let slot = &mut self.slots[direction.index()];
        warn!(
            %direction,
            master = ?slot.master,
            timeout_ms = self.action_timeout.as_millis() as u64,
            "progressive mirror timed out, resetting"
        );
        slot.clear();
        true
    }

    fn timed_out(&self, direction: Direction, now: Instant) -> bool {
        let slot = &self.slots[direction.index()];
        match (slot.phase, slot.started_at) {
            (ActionPhase::InProgress, Some(started)) => {
                // A start in the future counts as stuck.
                now.checked_duration_since(started)
                    .map_or(true, |elapsed| elapsed >= self.action_timeout)
            }
            _ => false,
        }
    }

    /// Interprets a change on an entity that may be the slave of a mirror.
    ///
    /// `direction` is the direction the change would travel, so the slot
    /// consulted is the reverse one, whose target is the changed entity.
    pub fn observe(
        &mut self,
        direction: Direction,
        new: &EntityState,
        kind: TransitionKind,
        now: Instant,
    ) -> Observation {
        let driving = direction.reverse();
        if self.timed_out(driving, now) {
            let generation = self.slots[driving.index()].generation;
            self.reap(driving, generation, now);
            return Observation::Pass;
        }

        let slot = &mut self.slots[driving.index()];
        match slot.phase {
            ActionPhase::Idle => Observation::Pass,
            ActionPhase::Starting => {
                if self.mode == ProgressiveMode::MasterSlave {
                    Observation::Following
                } else {
                    Observation::Pass
                }
            }
            ActionPhase::InProgress => {
                let reached = slot
                    .target
                    .as_ref()
                    .is_some_and(|target| target.matches(new, &self.tolerances));
                if reached {
                    debug!(direction = %driving, slave = %new.entity_id, "slave reached target");
                    slot.clear();
                    Observation::Completed
                } else if kind.is_progressive() || self.mode == ProgressiveMode::MasterSlave {
                    Observation::Following
                } else {
                    Observation::Pass
                }
            }
        }
    }

    /// Cancels whatever `direction` has in flight.
    ///
    /// Returns true if something was pending.
    pub fn cancel(&mut self, direction: Direction) -> bool {
        let slot = &mut self.slots[direction.index()];
        let pending = slot.phase != ActionPhase::Idle;
        slot.generation += 1;
        slot.clear();
        pending
    }

    /// Cancels both directions.
    pub fn reset(&mut self) {
        for direction in Direction::ALL {
            self.cancel(direction);
        }
    }

    /// Returns a copy of a direction's state.
    pub fn state(&self, direction: Direction) -> ActionState {
        self.slots[direction.index()].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinsync_model::{attrs, Value};

    const TIMEOUT: Duration = Duration::from_secs(3);

    fn arbitrator(mode: ProgressiveMode) -> Arbitrator {
        Arbitrator::new(mode, TIMEOUT, ToleranceTable::default())
    }

    fn cover(position: f64) -> EntityState {
        EntityState::new("cover.b", "open").with_attribute(attrs::CURRENT_POSITION, position)
    }

    fn target(position: f64) -> ExpectedState {
        ExpectedState {
            entity_id: EntityId::new("cover.b"),
            domain: twinsync_model::Domain::Cover,
            states: Vec::new(),
            attributes: [(attrs::CURRENT_POSITION.to_string(), Value::Number(position))]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn newer_begin_supersedes() {
        let mut arb = arbitrator(ProgressiveMode::Smart);
        let now = Instant::now();
        let first = arb.begin(Direction::AToB, EntityId::new("cover.a"), now);
        let second = arb.begin(Direction::AToB, EntityId::new("cover.a"), now);

        assert!(!arb.is_current(Direction::AToB, first));
        assert!(arb.is_current(Direction::AToB, second));
        assert!(!arb.mark_in_progress(Direction::AToB, first, target(50.0), now));
        assert!(!arb.finish(Direction::AToB, first));
        assert_eq!(arb.state(Direction::AToB).phase, ActionPhase::Starting);
    }

    #[test]
    fn slave_completion() {
        let mut arb = arbitrator(ProgressiveMode::Smart);
        let now = Instant::now();
        let generation = arb.begin(Direction::AToB, EntityId::new("cover.a"), now);
        arb.mark_in_progress(Direction::AToB, generation, target(50.0), now);

        assert_eq!(
            arb.observe(Direction::BToA, &cover(45.0), TransitionKind::Progressive, now),
            Observation::Following
        );
        assert_eq!(
            arb.observe(Direction::BToA, &cover(49.0), TransitionKind::Progressive, now),
            Observation::Completed
        );
        assert_eq!(arb.state(Direction::AToB).phase, ActionPhase::Idle);
    }

    #[test]
    fn instant_slave_change_passes_in_smart_mode() {
        let mut arb = arbitrator(ProgressiveMode::Smart);
        let now = Instant::now();
        let generation = arb.begin(Direction::AToB, EntityId::new("cover.a"), now);
        arb.mark_in_progress(Direction::AToB, generation, target(50.0), now);

        let closed = EntityState::new("cover.b", "closed");
        assert_eq!(
            arb.observe(Direction::BToA, &closed, TransitionKind::Instant, now),
            Observation::Pass
        );
    }

    #[test]
    fn master_slave_locks_the_slave() {
        let mut arb = arbitrator(ProgressiveMode::MasterSlave);
        let now = Instant::now();
        let generation = arb.begin(Direction::AToB, EntityId::new("cover.a"), now);
        let closed = EntityState::new("cover.b", "closed");
        assert_eq!(
            arb.observe(Direction::BToA, &closed, TransitionKind::Instant, now),
            Observation::Following
        );
        arb.mark_in_progress(Direction::AToB, generation, target(50.0), now);
        assert_eq!(
            arb.observe(Direction::BToA, &closed, TransitionKind::Instant, now),
            Observation::Following
        );
    }

    #[test]
    fn timeout_resets() {
        let mut arb = arbitrator(ProgressiveMode::Smart);
        let now = Instant::now();
        let generation = arb.begin(Direction::AToB, EntityId::new("cover.a"), now);
        arb.mark_in_progress(Direction::AToB, generation, target(50.0), now);

        assert!(!arb.reap(Direction::AToB, generation, now + Duration::from_secs(1)));
        assert!(arb.reap(Direction::AToB, generation, now + TIMEOUT));
        assert_eq!(arb.state(Direction::AToB).phase, ActionPhase::Idle);
    }

    #[test]
    fn observe_reaps_stale_action() {
        let mut arb = arbitrator(ProgressiveMode::Smart);
        let now = Instant::now();
        let generation = arb.begin(Direction::AToB, EntityId::new("cover.a"), now);
        arb.mark_in_progress(Direction::AToB, generation, target(50.0), now);

        assert_eq!(
            arb.observe(
                Direction::BToA,
                &cover(10.0),
                TransitionKind::Progressive,
                now + TIMEOUT + Duration::from_millis(1)
            ),
            Observation::Pass
        );
        assert_eq!(arb.state(Direction::AToB).phase, ActionPhase::Idle);
    }

    #[test]
    fn cancel_invalidates_generation() {
        let mut arb = arbitrator(ProgressiveMode::Realtime);
        let now = Instant::now();
        let generation = arb.begin(Direction::BToA, EntityId::new("cover.b"), now);
        assert!(arb.is_busy(Direction::BToA));
        assert!(!arb.is_busy(Direction::AToB));
        assert!(arb.cancel(Direction::BToA));
        assert!(!arb.is_current(Direction::BToA, generation));
        assert!(!arb.is_busy(Direction::BToA));
        assert!(!arb.cancel(Direction::BToA));
    }
}
