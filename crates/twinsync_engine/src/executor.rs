//! Sync executor: plans, invokes and accounts for one mirror.
//!
//! A sync runs in two steps so the caller can register what it expects
//! before the platform sees the first action:
//!
//! 1. [`SyncExecutor::prepare`] resolves the target, builds the plan and
//!    skips it if the target already matches.
//! 2. [`SyncExecutor::apply`] invokes each action with retries, checking a
//!    cancellation checkpoint between calls (never during one).
//!
//! Every outcome is folded into the link's [`SyncStats`].

use crate::config::{EngineConfig, RetryConfig, SyncMode};
use crate::direction::Direction;
use crate::error::{LinkError, LinkResult};
use crate::platform::Platform;
use crate::schema::ToleranceTable;
use crate::stats::{SyncRecord, SyncStats};
use crate::translator::{AttributeTranslator, ExpectedState, MirrorPlan};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use twinsync_model::{ActionRequest, EntityId, EntityState};

/// Why a sync did not actuate anything.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Target already matches the source.
    AlreadyInSync,
    /// One of the domains has no vocabulary.
    Unsupported(String),
    /// The plan came out empty.
    NothingToMirror,
    /// The source reports itself unavailable.
    Unavailable,
    /// A newer trigger took over.
    Superseded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyInSync => f.write_str("already in sync"),
            SkipReason::Unsupported(domain) => write!(f, "unsupported domain {domain}"),
            SkipReason::NothingToMirror => f.write_str("nothing to mirror"),
            SkipReason::Unavailable => f.write_str("source unavailable"),
            SkipReason::Superseded => f.write_str("superseded"),
        }
    }
}

/// Result of one sync.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Every action was accepted.
    Applied {
        /// State the target should reach.
        expected: ExpectedState,
        /// Number of actions invoked.
        actions: usize,
    },
    /// Nothing was invoked.
    Skipped(SkipReason),
    /// The sync gave up.
    Failed(LinkError),
}

impl SyncOutcome {
    /// Returns true for [`SyncOutcome::Applied`].
    pub fn is_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied { .. })
    }
}

/// A planned sync that has not been invoked yet.
#[derive(Debug, Clone)]
pub struct PreparedSync {
    direction: Direction,
    source: EntityId,
    target: EntityId,
    plan: MirrorPlan,
    started: Instant,
}

impl PreparedSync {
    /// State the target should reach.
    pub fn expected(&self) -> &ExpectedState {
        &self.plan.expected
    }

    /// Actions about to be invoked.
    pub fn actions(&self) -> &[ActionRequest] {
        &self.plan.actions
    }
}

/// Runs mirrors for one link and keeps its statistics.
pub struct SyncExecutor {
    platform: Arc<dyn Platform>,
    translator: AttributeTranslator,
    retry: RetryConfig,
    tolerances: ToleranceTable,
    stats: Mutex<SyncStats>,
}

impl fmt::Debug for SyncExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncExecutor")
            .field("translator", &self.translator)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl SyncExecutor {
    /// Creates an executor.
    pub fn new(platform: Arc<dyn Platform>, mode: SyncMode, config: &EngineConfig) -> Self {
        Self {
            platform,
            translator: AttributeTranslator::new(mode),
            retry: config.retry.clone(),
            tolerances: config.tolerances.clone(),
            stats: Mutex::new(SyncStats::new(config.history_len)),
        }
    }

    /// Resolves the target and builds the plan.
    ///
    /// Returns the final outcome instead when there is nothing to invoke;
    /// that outcome is already recorded.
    pub fn prepare(
        &self,
        direction: Direction,
        source: &EntityState,
        target_id: &EntityId,
    ) -> Result<PreparedSync, SyncOutcome> {
        let started = Instant::now();
        let early = |outcome: SyncOutcome| {
            self.record(direction, &source.entity_id, target_id, started, &outcome);
            outcome
        };

        let Some(target) = self.platform.get_state(target_id) else {
            return Err(early(SyncOutcome::Failed(LinkError::EntityNotFound(
                target_id.clone(),
            ))));
        };

        let plan = match self.translator.translate(source, &target) {
            Ok(plan) => plan,
            Err(LinkError::UnsupportedDomain(domain)) => {
                return Err(early(SyncOutcome::Skipped(SkipReason::Unsupported(domain))))
            }
            Err(e) => return Err(early(SyncOutcome::Failed(e))),
        };

        if plan.is_empty() {
            return Err(early(SyncOutcome::Skipped(SkipReason::NothingToMirror)));
        }
        if plan.expected.matches(&target, &self.tolerances) {
            return Err(early(SyncOutcome::Skipped(SkipReason::AlreadyInSync)));
        }

        Ok(PreparedSync {
            direction,
            source: source.entity_id.clone(),
            target: target_id.clone(),
            plan,
            started,
        })
    }

    /// Invokes a prepared plan.
    ///
    /// `checkpoint` is consulted before each action and before each retry;
    /// once it returns false the sync stops as superseded.
    pub async fn apply<F>(&self, prepared: PreparedSync, checkpoint: F) -> SyncOutcome
    where
        F: Fn() -> bool + Send + Sync,
    {
        let PreparedSync {
            direction,
            source,
            target,
            plan,
            started,
        } = prepared;

        let mut outcome = SyncOutcome::Applied {
            actions: plan.actions.len(),
            expected: plan.expected,
        };
        for action in &plan.actions {
            if !checkpoint() {
                outcome = SyncOutcome::Skipped(SkipReason::Superseded);
                break;
            }
            match self.invoke_with_retry(action, &checkpoint).await {
                Ok(()) => {}
                Err(LinkError::Cancelled) => {
                    outcome = SyncOutcome::Skipped(SkipReason::Superseded);
                    break;
                }
                Err(e) => {
                    outcome = SyncOutcome::Failed(e);
                    break;
                }
            }
        }

        self.record(direction, &source, &target, started, &outcome);
        outcome
    }

    async fn invoke_with_retry<F>(&self, action: &ActionRequest, checkpoint: &F) -> LinkResult<()>
    where
        F: Fn() -> bool + Send + Sync,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for_attempt(attempt);
                debug!(%action, attempt, delay_ms = delay.as_millis() as u64, "retrying action");
                tokio::time::sleep(delay).await;
                if !checkpoint() {
                    return Err(LinkError::Cancelled);
                }
            }

            match self.platform.invoke_action(action).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    warn!(%action, attempt, error = %e, "action failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(LinkError::Cancelled))
    }

    /// Records a sync that failed before reaching the executor proper.
    pub fn record_failure(
        &self,
        direction: Direction,
        source: &EntityId,
        target: &EntityId,
        started: Instant,
        error: LinkError,
    ) {
        self.record(direction, source, target, started, &SyncOutcome::Failed(error));
    }

    fn record(
        &self,
        direction: Direction,
        source: &EntityId,
        target: &EntityId,
        started: Instant,
        outcome: &SyncOutcome,
    ) {
        let duration = started.elapsed();
        let entry = |success: bool, error: Option<String>| SyncRecord {
            timestamp: SystemTime::now(),
            direction,
            source: source.clone(),
            target: target.clone(),
            duration,
            success,
            error,
        };

        let mut stats = self.stats.lock();
        match outcome {
            SyncOutcome::Applied { actions, .. } => {
                info!(%direction, %source, %target, actions, duration_ms = duration.as_millis() as u64, "mirrored");
                stats.record_success(entry(true, None));
            }
            SyncOutcome::Skipped(reason) => {
                debug!(%direction, %source, %target, %reason, "sync skipped");
                stats.record_skip();
            }
            SyncOutcome::Failed(error) => {
                warn!(%direction, %source, %target, %error, "sync failed");
                stats.record_failure(entry(false, Some(error.to_string())));
            }
        }
    }

    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.lock().clone()
    }
}
