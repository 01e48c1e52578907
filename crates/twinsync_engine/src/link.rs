//! One link between two entities and its change pipeline.
//!
//! Both subscriptions feed the same handler, parameterized by [`Side`]:
//!
//! ```text
//! callback -> availability -> classifier -> arbitrator.observe -> guard
//!          -> Instant:     critical section -> executor
//!          -> Progressive: arbitrator.begin -> (settle) -> executor
//! ```
//!
//! Everything up to the guard runs synchronously inside the callback. Only
//! the mirror itself is spawned onto the runtime captured when the link was
//! created, so callbacks may fire from any thread.

use crate::arbitrator::{ActionPhase, Arbitrator, Observation};
use crate::classifier::ChangeClassifier;
use crate::config::{EngineConfig, LinkConfig, ProgressiveMode, SyncMode};
use crate::direction::{Direction, Side};
use crate::error::{LinkError, LinkResult};
use crate::event::ChangeEvent;
use crate::executor::{SkipReason, SyncExecutor, SyncOutcome};
use crate::guard::{GuardDecision, LoopGuard};
use crate::health::EntityHealth;
use crate::manager::LinkId;
use crate::platform::{Platform, StateCallback, SubscriptionHandle};
use crate::stats::SyncStats;
use crate::transition::{TransitionDetector, TransitionKind};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use twinsync_model::{Domain, EntityId, EntityState};

/// Snapshot of one linked entity for status reports.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    /// Entity identifier.
    pub entity_id: EntityId,
    /// Device class.
    pub domain: Domain,
    /// Current state token, if the entity resolves.
    pub state: Option<String>,
    /// Reachability.
    pub health: EntityHealth,
}

impl EntitySummary {
    fn probe(entity_id: &EntityId, platform: &dyn Platform) -> Self {
        let state = platform.get_state(entity_id);
        Self {
            entity_id: entity_id.clone(),
            domain: entity_id.domain(),
            health: EntityHealth::of(state.as_ref()),
            state: state.map(|s| s.state),
        }
    }
}

/// Status of a link.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Link identifier.
    pub link_id: LinkId,
    /// Whether changes are mirrored.
    pub enabled: bool,
    /// Whether both subscriptions are live.
    pub subscribed: bool,
    /// Attribute coverage.
    pub sync_mode: SyncMode,
    /// Gradual change handling.
    pub progressive_mode: ProgressiveMode,
    /// First entity.
    pub entity_a: EntitySummary,
    /// Second entity.
    pub entity_b: EntitySummary,
    /// Progressive phase of A to B.
    pub a_to_b: ActionPhase,
    /// Progressive phase of B to A.
    pub b_to_a: ActionPhase,
    /// Counters and history.
    pub stats: SyncStats,
}

/// A pair of entities kept in sync.
pub struct SyncLink {
    id: LinkId,
    config: LinkConfig,
    engine: EngineConfig,
    enabled: AtomicBool,
    platform: Arc<dyn Platform>,
    runtime: Handle,
    this: Weak<SyncLink>,
    classifier: ChangeClassifier,
    detector: TransitionDetector,
    guard: Mutex<LoopGuard>,
    arbitrator: Mutex<Arbitrator>,
    executor: SyncExecutor,
    critical: tokio::sync::Mutex<()>,
    subscriptions: Mutex<Vec<SubscriptionHandle>>,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for SyncLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncLink")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl SyncLink {
    /// Creates a link. Nothing is subscribed until [`SyncLink::setup`].
    pub fn new(
        id: LinkId,
        config: LinkConfig,
        engine: EngineConfig,
        platform: Arc<dyn Platform>,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| SyncLink {
            id,
            enabled: AtomicBool::new(config.enabled),
            classifier: ChangeClassifier::new(engine.tolerances.clone()),
            detector: TransitionDetector::new(engine.tolerances.clone()),
            guard: Mutex::new(LoopGuard::new(
                config.cooldown,
                engine.direction_lock,
                engine.tolerances.clone(),
            )),
            arbitrator: Mutex::new(Arbitrator::new(
                config.progressive_mode,
                config.action_timeout,
                engine.tolerances.clone(),
            )),
            executor: SyncExecutor::new(platform.clone(), config.sync_mode, &engine),
            critical: tokio::sync::Mutex::new(()),
            subscriptions: Mutex::new(Vec::new()),
            health_task: Mutex::new(None),
            this: this.clone(),
            platform,
            runtime,
            config,
            engine,
        })
    }

    /// Returns the link ID.
    pub fn id(&self) -> LinkId {
        self.id
    }

    /// Returns the link configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub(crate) fn engine(&self) -> &EngineConfig {
        &self.engine
    }

    pub(crate) fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub(crate) fn weak(&self) -> Weak<SyncLink> {
        self.this.clone()
    }

    /// Returns the entity on one side.
    pub fn entity(&self, side: Side) -> &EntityId {
        match side {
            Side::A => &self.config.entity_a,
            Side::B => &self.config.entity_b,
        }
    }

    /// Returns true if changes are mirrored.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Returns true if both sides are subscribed.
    pub fn is_subscribed(&self) -> bool {
        self.subscriptions.lock().len() == 2
    }

    /// Subscribes to both entities, replacing existing subscriptions.
    pub fn setup(&self) {
        self.teardown();
        if !self.is_enabled() {
            return;
        }

        let mut handles = Vec::with_capacity(2);
        for side in [Side::A, Side::B] {
            let entity_id = self.entity(side);
            if self.platform.get_state(entity_id).is_none() {
                warn!(link = %self.id, entity = %entity_id, "subscribing to an entity that does not resolve yet");
            }
            let link = self.this.clone();
            let callback: StateCallback = Arc::new(move |old, new| {
                if let Some(link) = link.upgrade() {
                    link.on_change(side, old, new);
                }
            });
            handles.push(self.platform.subscribe(entity_id, callback));
        }
        self.subscriptions.lock().extend(handles);
        debug!(link = %self.id, a = %self.config.entity_a, b = %self.config.entity_b, "subscribed");
    }

    /// Drops both subscriptions.
    pub fn teardown(&self) {
        let handles: Vec<_> = self.subscriptions.lock().drain(..).collect();
        for handle in handles {
            self.platform.unsubscribe(handle);
        }
    }

    /// Enables or disables mirroring.
    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::SeqCst) == enabled {
            return;
        }
        info!(link = %self.id, enabled, "link toggled");
        if enabled {
            self.setup();
        } else {
            self.teardown();
            self.forget();
        }
    }

    /// Unsubscribes, forgets in-flight state and subscribes again.
    pub fn reload(&self) {
        info!(link = %self.id, "reloading link");
        self.teardown();
        self.forget();
        self.setup();
    }

    /// Stops the health monitor and drops everything the link holds.
    pub fn shutdown(&self) {
        if let Some(task) = self.health_task.lock().take() {
            task.abort();
        }
        self.teardown();
        self.forget();
    }

    pub(crate) fn set_health_task(&self, task: JoinHandle<()>) {
        if let Some(previous) = self.health_task.lock().replace(task) {
            previous.abort();
        }
    }

    fn forget(&self) {
        self.arbitrator.lock().reset();
        self.guard.lock().reset();
    }

    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> SyncStats {
        self.executor.stats()
    }

    /// Returns the link status.
    pub fn status(&self) -> SyncStatus {
        let (a_to_b, b_to_a) = {
            let arbitrator = self.arbitrator.lock();
            (
                arbitrator.state(Direction::AToB).phase,
                arbitrator.state(Direction::BToA).phase,
            )
        };
        SyncStatus {
            link_id: self.id,
            enabled: self.is_enabled(),
            subscribed: self.is_subscribed(),
            sync_mode: self.config.sync_mode,
            progressive_mode: self.config.progressive_mode,
            entity_a: EntitySummary::probe(&self.config.entity_a, self.platform()),
            entity_b: EntitySummary::probe(&self.config.entity_b, self.platform()),
            a_to_b,
            b_to_a,
            stats: self.stats(),
        }
    }

    /// Handles one state change on `side`.
    pub fn on_change(&self, side: Side, old: Option<EntityState>, new: EntityState) {
        self.handle(ChangeEvent::new(side, old, new));
    }

    fn handle(&self, event: ChangeEvent) {
        if !self.is_enabled() {
            return;
        }
        let direction = event.direction();
        let source = &event.entity_id;

        if event.new.is_unavailable() {
            debug!(link = %self.id, %source, state = %event.new.state, "source unavailable, not mirroring");
            return;
        }
        if event.is_recovery() {
            info!(link = %self.id, %source, "entity recovered");
            return;
        }
        let target_id = self.entity(direction.target());
        match self.platform.get_state(target_id) {
            Some(target) if !target.is_unavailable() => {}
            _ => {
                debug!(link = %self.id, target = %target_id, "target unavailable, not mirroring");
                return;
            }
        }

        if !self
            .classifier
            .classify(event.old.as_ref(), &event.new)
            .is_significant()
        {
            trace!(link = %self.id, %source, "insignificant change");
            return;
        }
        let kind = self.detector.detect(event.old.as_ref(), &event.new);

        let observation =
            self.arbitrator
                .lock()
                .observe(direction, &event.new, kind, event.observed_at);
        if observation != Observation::Pass {
            debug!(link = %self.id, %source, ?observation, "slave follow-up, not mirroring");
            return;
        }

        let in_burst = kind.is_progressive() || self.arbitrator.lock().is_busy(direction);
        let decision =
            self.guard
                .lock()
                .check(direction, &event.new, event.observed_at, in_burst);
        if let GuardDecision::Suppressed(reason) = decision {
            debug!(link = %self.id, %direction, %reason, "suppressed");
            return;
        }

        match kind {
            TransitionKind::Instant => {
                if self.arbitrator.lock().cancel(direction) {
                    debug!(link = %self.id, %direction, "instant change cancels progressive mirror");
                }
                self.spawn_instant(direction, event.new);
            }
            TransitionKind::Progressive => {
                let generation =
                    self.arbitrator
                        .lock()
                        .begin(direction, event.entity_id.clone(), event.observed_at);
                self.spawn_progressive(direction, event.new, generation);
            }
        }
    }

    fn spawn_instant(&self, direction: Direction, source: EntityState) {
        let Some(link) = self.this.upgrade() else {
            return;
        };
        self.runtime.spawn(async move {
            link.run_instant(direction, source).await;
        });
    }

    fn spawn_progressive(&self, direction: Direction, source: EntityState, generation: u64) {
        let Some(link) = self.this.upgrade() else {
            return;
        };
        self.runtime.spawn(async move {
            if link.config.progressive_mode.debounces() {
                tokio::time::sleep(link.engine.settle_delay).await;
            }
            if !link.arbitrator.lock().is_current(direction, generation) {
                trace!(link = %link.id, %direction, generation, "superseded before sending");
                return;
            }
            let target = link.entity(direction.target()).clone();
            link.mirror(direction, &source, &target, Some(generation))
                .await;
        });
    }

    async fn run_instant(&self, direction: Direction, source: EntityState) -> SyncOutcome {
        let started = Instant::now();
        let target = self.entity(direction.target()).clone();

        let Ok(_section) =
            tokio::time::timeout(self.engine.lock_timeout, self.critical.lock()).await
        else {
            let error = LinkError::LockAcquisitionTimeout;
            self.executor
                .record_failure(direction, &source.entity_id, &target, started, error.clone());
            return SyncOutcome::Failed(error);
        };

        self.mirror(direction, &source, &target, None).await
    }

    /// Runs one mirror. `generation` is set on the progressive path.
    async fn mirror(
        &self,
        direction: Direction,
        source: &EntityState,
        target: &EntityId,
        generation: Option<u64>,
    ) -> SyncOutcome {
        let prepared = match self.executor.prepare(direction, source, target) {
            Ok(prepared) => prepared,
            Err(outcome) => {
                if let Some(generation) = generation {
                    self.arbitrator.lock().finish(direction, generation);
                }
                return outcome;
            }
        };
        let expected = prepared.expected().clone();
        let now = Instant::now();

        if let Some(generation) = generation {
            let claimed = self.arbitrator.lock().mark_in_progress(
                direction,
                generation,
                expected.clone(),
                now,
            );
            if !claimed {
                return SyncOutcome::Skipped(SkipReason::Superseded);
            }
            self.spawn_watchdog(direction, generation);
        }
        self.guard.lock().record_echo(expected.clone(), now);

        let outcome = match generation {
            Some(generation) => {
                self.executor
                    .apply(prepared, || {
                        self.arbitrator.lock().is_current(direction, generation)
                    })
                    .await
            }
            None => self.executor.apply(prepared, || true).await,
        };

        if outcome.is_applied() {
            self.guard.lock().mark_synced(direction, Instant::now());
        } else {
            self.guard.lock().clear_echo(&expected);
            if let Some(generation) = generation {
                self.arbitrator.lock().finish(direction, generation);
            }
        }
        outcome
    }

    fn spawn_watchdog(&self, direction: Direction, generation: u64) {
        let link = self.this.clone();
        let timeout = self.config.action_timeout;
        self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(link) = link.upgrade() {
                link.arbitrator
                    .lock()
                    .reap(direction, generation, Instant::now());
            }
        });
    }

    /// Mirrors the current state of the source side at once.
    ///
    /// Bypasses cooldown and direction lock and runs on the instant path.
    pub async fn manual_sync(&self, direction: Direction) -> LinkResult<SyncOutcome> {
        let source_id = self.entity(direction.source());
        let Some(source) = self.platform.get_state(source_id) else {
            let error = LinkError::EntityNotFound(source_id.clone());
            warn!(link = %self.id, %direction, error = %error, "manual sync failed");
            self.executor.record_failure(
                direction,
                source_id,
                self.entity(direction.target()),
                Instant::now(),
                error.clone(),
            );
            return Err(error);
        };
        if source.is_unavailable() {
            return Ok(SyncOutcome::Skipped(SkipReason::Unavailable));
        }

        info!(link = %self.id, %direction, "manual sync");
        self.arbitrator.lock().cancel(direction);
        self.guard.lock().mark_synced(direction, Instant::now());
        Ok(self.run_instant(direction, source).await)
    }
}
