//! Simulate command implementation.
//!
//! Replays a scenario on a paused clock: the settle delay, cooldown and
//! health interval all elapse in virtual time, so a scenario spanning
//! minutes finishes immediately and always produces the same output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;
use twinsync_engine::{
    Direction, EngineConfig, HealthReport, LinkConfig, LinkManager, ProgressiveMode, SyncMode,
    SyncOutcome, SyncStatus,
};
use twinsync_model::{ActionRequest, EntityId, EntityState};
use twinsync_testkit::MemoryPlatform;

/// A recorded stream of state changes for one link.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Initial entity states.
    pub states: Vec<EntityState>,
    /// The link under test.
    pub link: LinkSpec,
    /// Whether targets confirm accepted actions.
    #[serde(default = "default_auto_apply")]
    pub auto_apply: bool,
    /// Delay of every invocation, in milliseconds.
    #[serde(default)]
    pub latency_ms: u64,
    /// Steps, replayed in `at_ms` order.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Quiet time after the last step, in milliseconds.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_auto_apply() -> bool {
    true
}

fn default_settle_ms() -> u64 {
    5_000
}

/// Link settings in a scenario.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkSpec {
    /// First entity.
    pub entity_a: EntityId,
    /// Second entity.
    pub entity_b: EntityId,
    /// Attribute coverage.
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// Gradual change handling.
    #[serde(default)]
    pub progressive_mode: ProgressiveMode,
    /// Cooldown override, in milliseconds.
    pub cooldown_ms: Option<u64>,
    /// Action timeout override, in milliseconds.
    pub action_timeout_ms: Option<u64>,
}

impl LinkSpec {
    fn to_config(&self) -> LinkConfig {
        let mut config = LinkConfig::new(self.entity_a.clone(), self.entity_b.clone())
            .with_sync_mode(self.sync_mode)
            .with_progressive_mode(self.progressive_mode);
        if let Some(ms) = self.cooldown_ms {
            config = config.with_cooldown(Duration::from_millis(ms));
        }
        if let Some(ms) = self.action_timeout_ms {
            config = config.with_action_timeout(Duration::from_millis(ms));
        }
        config
    }
}

/// One timed step.
#[derive(Debug, Deserialize)]
pub struct Step {
    /// Offset from the start of the run.
    pub at_ms: u64,
    /// What happens.
    #[serde(flatten)]
    pub action: StepAction,
}

/// What a step does.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepAction {
    /// An entity reports a new state.
    State {
        /// The new state.
        state: EntityState,
    },
    /// An entity stops resolving.
    Remove {
        /// Entity to remove.
        entity_id: EntityId,
    },
    /// A forced one-shot sync.
    ManualSync {
        /// Direction to mirror.
        direction: Direction,
    },
    /// An immediate health check.
    HealthCheck,
    /// The link is enabled or disabled.
    SetEnabled {
        /// New value.
        enabled: bool,
    },
}

/// What a run produced.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    /// Every action the engine invoked, in order.
    pub invocations: Vec<ActionRequest>,
    /// Results of manual syncs.
    pub manual_syncs: Vec<String>,
    /// Results of explicit health checks.
    pub health_checks: Vec<HealthReport>,
    /// Link status at the end of the run.
    pub status: SyncStatus,
    /// Entity states at the end of the run.
    pub final_states: Vec<EntityState>,
}

/// Runs the simulate command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read scenario {}: {e}", path.display()))?;
    let scenario: Scenario = serde_json::from_str(&contents)?;
    let report = simulate(scenario)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => print_text(&report),
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}

/// Replays a scenario on a fresh paused runtime.
pub fn simulate(scenario: Scenario) -> Result<SimulationReport, Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()?;
    runtime.block_on(replay(scenario))
}

async fn replay(mut scenario: Scenario) -> Result<SimulationReport, Box<dyn std::error::Error>> {
    let platform = Arc::new(MemoryPlatform::with_states(scenario.states.drain(..)));
    platform.set_auto_apply(scenario.auto_apply);
    platform.set_latency(Duration::from_millis(scenario.latency_ms));

    let manager = LinkManager::new(platform.clone(), EngineConfig::default());
    let config = scenario.link.to_config();
    let (entity_a, entity_b) = (config.entity_a.clone(), config.entity_b.clone());
    let id = manager.add_link(config).await?;

    let mut manual_syncs = Vec::new();
    let mut health_checks = Vec::new();
    let start = Instant::now();
    scenario.steps.sort_by_key(|step| step.at_ms);

    for step in scenario.steps {
        tokio::time::sleep_until(start + Duration::from_millis(step.at_ms)).await;
        info!(at_ms = step.at_ms, action = ?step.action, "step");
        match step.action {
            StepAction::State { state } => platform.set_state(state),
            StepAction::Remove { entity_id } => {
                platform.remove(&entity_id);
            }
            StepAction::ManualSync { direction } => {
                let outcome = manager.manual_sync(id, direction).await?;
                manual_syncs.push(describe(&outcome));
            }
            StepAction::HealthCheck => health_checks.push(manager.health_check(id).await?),
            StepAction::SetEnabled { enabled } => manager.set_enabled(id, enabled)?,
        }
    }
    tokio::time::sleep(Duration::from_millis(scenario.settle_ms)).await;

    let status = manager.get_sync_status(id)?;
    manager.shutdown();

    let final_states = [entity_a, entity_b]
        .iter()
        .filter_map(|entity| platform.state(entity.as_str()))
        .collect();
    Ok(SimulationReport {
        invocations: platform.invocations(),
        manual_syncs,
        health_checks,
        status,
        final_states,
    })
}

fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Applied { actions, .. } => format!("applied {actions} action(s)"),
        SyncOutcome::Skipped(reason) => format!("skipped: {reason}"),
        SyncOutcome::Failed(error) => format!("failed: {error}"),
    }
}

fn print_text(report: &SimulationReport) {
    println!("Invocations: {}", report.invocations.len());
    for (i, action) in report.invocations.iter().enumerate() {
        println!("  {}. {}", i + 1, action);
    }
    for outcome in &report.manual_syncs {
        println!("Manual sync: {outcome}");
    }
    for check in &report.health_checks {
        println!("Health check: {:?}", check.status);
    }

    let stats = &report.status.stats;
    println!(
        "Stats: {} attempts, {} succeeded, {} failed, {} skipped",
        stats.attempts, stats.succeeded, stats.failed, stats.skipped
    );
    if let Some(error) = &stats.last_error {
        println!("Last error: {error}");
    }
    for state in &report.final_states {
        println!("Final {}: {}", state.entity_id, state.state);
    }
}
