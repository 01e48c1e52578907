//! Link health monitor.
//!
//! A periodic check per link that tells apart two failure modes:
//!
//! - **Missing**: an entity no longer resolves. Subscriptions are torn down
//!   and the link enters a bounded re-acquisition loop with growing backoff.
//!   On success it subscribes again; otherwise the next tick retries.
//! - **Unavailable**: the entity resolves but reports `unavailable`.
//!   Subscriptions stay as they are and the pipeline skips mirroring until
//!   the device comes back.
//!
//! Each check also logs the link's sync statistics.

use crate::link::SyncLink;
use crate::manager::LinkId;
use serde::Serialize;
use std::sync::Weak;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use twinsync_model::EntityState;

/// Success rate under which the stats report warns.
const LOW_SUCCESS_RATE: f64 = 0.8;

/// Average sync duration over which the stats report warns.
const SLOW_SYNC: Duration = Duration::from_secs(2);

/// Reachability of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityHealth {
    /// Resolves and reports a usable state.
    Available,
    /// Resolves but reports `unavailable` or `unknown`.
    Unavailable,
    /// Does not resolve.
    Missing,
}

impl EntityHealth {
    /// Classifies a lookup result.
    pub fn of(state: Option<&EntityState>) -> Self {
        match state {
            None => EntityHealth::Missing,
            Some(state) if state.is_unavailable() => EntityHealth::Unavailable,
            Some(_) => EntityHealth::Available,
        }
    }
}

/// Verdict of one health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Both entities available and subscribed.
    Healthy,
    /// Both resolve, at least one reports unavailable.
    Degraded,
    /// Subscriptions were re-established during this check.
    Recovered,
    /// An entity is still missing after re-acquisition.
    Missing,
    /// The link is disabled; nothing was checked.
    Disabled,
}

/// Result of [`SyncLink::health_check`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Link checked.
    pub link_id: LinkId,
    /// Verdict.
    pub status: HealthStatus,
    /// Entity A reachability at the end of the check.
    pub entity_a: EntityHealth,
    /// Entity B reachability at the end of the check.
    pub entity_b: EntityHealth,
    /// Whether subscriptions are live after the check.
    pub subscribed: bool,
}

impl SyncLink {
    fn probe(&self) -> (EntityHealth, EntityHealth) {
        let a = self.platform().get_state(&self.config().entity_a);
        let b = self.platform().get_state(&self.config().entity_b);
        (EntityHealth::of(a.as_ref()), EntityHealth::of(b.as_ref()))
    }

    /// Revalidates both entities and repairs subscriptions.
    pub async fn health_check(&self) -> HealthReport {
        if !self.is_enabled() {
            return self.report(HealthStatus::Disabled);
        }

        let (a, b) = self.probe();
        let status = if a == EntityHealth::Missing || b == EntityHealth::Missing {
            warn!(link = %self.id(), entity_a = ?a, entity_b = ?b, "entity missing, dropping subscriptions");
            self.teardown();
            if self.reacquire().await {
                info!(link = %self.id(), "entities re-acquired, resubscribing");
                self.setup();
                HealthStatus::Recovered
            } else {
                error!(link = %self.id(), "entities still missing, retrying on next check");
                HealthStatus::Missing
            }
        } else if !self.is_subscribed() {
            info!(link = %self.id(), "entities resolve again, resubscribing");
            self.setup();
            HealthStatus::Recovered
        } else if a == EntityHealth::Unavailable || b == EntityHealth::Unavailable {
            info!(link = %self.id(), entity_a = ?a, entity_b = ?b, "entity unavailable, keeping subscriptions");
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        self.log_stats();
        self.report(status)
    }

    async fn reacquire(&self) -> bool {
        let policy = &self.engine().reacquire;
        for attempt in 1..=policy.max_attempts {
            let delay = policy.delay_for_attempt(attempt);
            info!(link = %self.id(), attempt, delay_ms = delay.as_millis() as u64, "waiting to re-acquire entities");
            tokio::time::sleep(delay).await;

            if !self.is_enabled() {
                return false;
            }
            let (a, b) = self.probe();
            if a != EntityHealth::Missing && b != EntityHealth::Missing {
                return true;
            }
        }
        false
    }

    fn report(&self, status: HealthStatus) -> HealthReport {
        let (entity_a, entity_b) = self.probe();
        HealthReport {
            link_id: self.id(),
            status,
            entity_a,
            entity_b,
            subscribed: self.is_subscribed(),
        }
    }

    fn log_stats(&self) {
        let stats = self.stats();
        let Some(rate) = stats.success_rate() else {
            return;
        };
        let average_ms = stats.average_duration.as_millis() as u64;
        info!(
            link = %self.id(),
            attempts = stats.attempts,
            succeeded = stats.succeeded,
            failed = stats.failed,
            skipped = stats.skipped,
            success_rate = rate,
            average_ms,
            "sync stats"
        );
        if rate < LOW_SUCCESS_RATE {
            warn!(link = %self.id(), success_rate = rate, last_error = ?stats.last_error, "low sync success rate");
        }
        if stats.average_duration > SLOW_SYNC {
            warn!(link = %self.id(), average_ms, "slow syncs");
        }
    }

    /// Starts the periodic health check on the link's runtime.
    pub fn start_health_monitor(&self) {
        let period = self.engine().health_check_interval;
        let task = self.runtime().spawn(monitor(self.weak(), period));
        self.set_health_task(task);
    }
}

async fn monitor(link: Weak<SyncLink>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(link) = link.upgrade() else {
            break;
        };
        link.health_check().await;
    }
}
