//! Loop guard: keeps a link from feeding its own mirror actions back.
//!
//! Checks run in a fixed order and the first one that fires wins:
//!
//! 1. **Echo**: the new state matches what this link expects to see as a
//!    result of its own action, and the expectation has not expired.
//! 2. **Direction lock**: the opposite direction synced within the lock
//!    window.
//! 3. **Cooldown**: any direction synced within the link cooldown. A change
//!    continuing a burst its side already leads skips this step.
//! 4. **Permit**: the direction timestamp is recorded before the caller
//!    does anything else.
//!
//! The guard never blocks. It is kept behind the link's mutex so a check
//! and its record happen as one step.

use crate::direction::Direction;
use crate::schema::ToleranceTable;
use crate::translator::ExpectedState;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use twinsync_model::{EntityId, EntityState};

/// Why a change was not mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Confirmation of this link's own action.
    Echo,
    /// The opposite direction just synced.
    DirectionLock,
    /// The link synced too recently.
    Cooldown,
    /// A recorded timestamp lies in the future.
    ClockSkew,
}

impl fmt::Display for SuppressReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SuppressReason::Echo => "echo",
            SuppressReason::DirectionLock => "direction lock",
            SuppressReason::Cooldown => "cooldown",
            SuppressReason::ClockSkew => "clock skew",
        })
    }
}

/// Result of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Mirror the change.
    Permit,
    /// Drop the change.
    Suppressed(SuppressReason),
}

impl GuardDecision {
    /// Returns true for [`GuardDecision::Permit`].
    pub fn is_permit(&self) -> bool {
        matches!(self, GuardDecision::Permit)
    }
}

/// A state this link expects to observe because it caused it.
#[derive(Debug, Clone)]
pub struct EchoRecord {
    /// Expected target state.
    pub expected: ExpectedState,
    /// When the record stops suppressing.
    pub expires_at: Instant,
}

/// Per-link loop suppression state.
#[derive(Debug)]
pub struct LoopGuard {
    cooldown: Duration,
    direction_lock: Duration,
    tolerances: ToleranceTable,
    last_sync: [Option<Instant>; 2],
    echoes: HashMap<EntityId, EchoRecord>,
}

impl LoopGuard {
    /// Creates a guard.
    pub fn new(cooldown: Duration, direction_lock: Duration, tolerances: ToleranceTable) -> Self {
        Self {
            cooldown,
            direction_lock,
            tolerances,
            last_sync: [None; 2],
            echoes: HashMap::new(),
        }
    }

    /// Checks a change travelling in `direction` and records it if permitted.
    ///
    /// `in_burst` marks a progressive change, or any change while its
    /// direction still has a progressive mirror pending.
    pub fn check(
        &mut self,
        direction: Direction,
        new: &EntityState,
        now: Instant,
        in_burst: bool,
    ) -> GuardDecision {
        if let Some(record) = self.echoes.get(&new.entity_id) {
            if now >= record.expires_at {
                self.echoes.remove(&new.entity_id);
            } else if record.expected.matches(new, &self.tolerances) {
                return GuardDecision::Suppressed(SuppressReason::Echo);
            }
        }

        if let Some(last) = self.last_sync[direction.reverse().index()] {
            match now.checked_duration_since(last) {
                None => return GuardDecision::Suppressed(SuppressReason::ClockSkew),
                Some(elapsed) if elapsed < self.direction_lock => {
                    return GuardDecision::Suppressed(SuppressReason::DirectionLock)
                }
                Some(_) => {}
            }
        }

        let continuation = in_burst && self.leads(direction);
        if !continuation {
            for last in self.last_sync.iter().flatten() {
                match now.checked_duration_since(*last) {
                    None => return GuardDecision::Suppressed(SuppressReason::ClockSkew),
                    Some(elapsed) if elapsed < self.cooldown => {
                        return GuardDecision::Suppressed(SuppressReason::Cooldown)
                    }
                    Some(_) => {}
                }
            }
        }

        self.last_sync[direction.index()] = Some(now);
        GuardDecision::Permit
    }

    /// Returns true if `direction` synced last, so its source leads the burst.
    pub fn leads(&self, direction: Direction) -> bool {
        match (
            self.last_sync[direction.index()],
            self.last_sync[direction.reverse().index()],
        ) {
            (Some(ours), Some(theirs)) => ours >= theirs,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Records the state the target is expected to report.
    pub fn record_echo(&mut self, expected: ExpectedState, now: Instant) {
        let record = EchoRecord {
            expires_at: now + self.cooldown,
            expected,
        };
        self.echoes.insert(record.expected.entity_id.clone(), record);
    }

    /// Forgets an expectation, unless a newer one replaced it.
    pub fn clear_echo(&mut self, expected: &ExpectedState) {
        if self
            .echoes
            .get(&expected.entity_id)
            .is_some_and(|record| record.expected == *expected)
        {
            self.echoes.remove(&expected.entity_id);
        }
    }

    /// Refreshes the timestamp of a direction without checking.
    pub fn mark_synced(&mut self, direction: Direction, now: Instant) {
        let slot = &mut self.last_sync[direction.index()];
        if slot.map_or(true, |last| last <= now) {
            *slot = Some(now);
        }
    }

    /// Returns the last sync time of a direction.
    pub fn last_sync(&self, direction: Direction) -> Option<Instant> {
        self.last_sync[direction.index()]
    }

    /// Number of live echo records.
    pub fn pending_echoes(&self, now: Instant) -> usize {
        self.echoes.values().filter(|r| r.expires_at > now).count()
    }

    /// Clears all timestamps and echoes.
    pub fn reset(&mut self) {
        self.last_sync = [None; 2];
        self.echoes.clear();
    }
}
