//! Configuration for links and the engine.

use crate::error::{LinkError, LinkResult};
use crate::schema::ToleranceTable;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use twinsync_model::EntityId;

/// How much of the source state is mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Mirror every attribute the target domain understands.
    #[default]
    Perfect,
    /// Mirror only the active/inactive projection.
    Basic,
}

/// How gradual (progressive) changes are mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressiveMode {
    /// Wait for the burst to settle, then send the latest target.
    #[default]
    Smart,
    /// Send every progressive step immediately.
    Realtime,
    /// Like `Smart`, and the slave is fully locked while an action is in flight.
    MasterSlave,
}

impl ProgressiveMode {
    /// Returns true if progressive triggers wait for the settle delay.
    pub fn debounces(&self) -> bool {
        !matches!(self, ProgressiveMode::Realtime)
    }
}

impl SyncMode {
    /// Returns the configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Perfect => "perfect",
            SyncMode::Basic => "basic",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMode {
    type Err = LinkError;

    fn from_str(s: &str) -> LinkResult<Self> {
        match s {
            "perfect" => Ok(SyncMode::Perfect),
            "basic" => Ok(SyncMode::Basic),
            other => Err(LinkError::InvalidConfig(format!("unknown sync mode: {other}"))),
        }
    }
}

impl ProgressiveMode {
    /// Returns the configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressiveMode::Smart => "smart",
            ProgressiveMode::Realtime => "realtime",
            ProgressiveMode::MasterSlave => "master_slave",
        }
    }
}

impl fmt::Display for ProgressiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressiveMode {
    type Err = LinkError;

    fn from_str(s: &str) -> LinkResult<Self> {
        match s {
            "smart" => Ok(ProgressiveMode::Smart),
            "realtime" => Ok(ProgressiveMode::Realtime),
            "master_slave" => Ok(ProgressiveMode::MasterSlave),
            other => Err(LinkError::InvalidConfig(format!(
                "unknown progressive mode: {other}"
            ))),
        }
    }
}

/// Configuration of one link between two entities.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    /// First entity.
    pub entity_a: EntityId,
    /// Second entity.
    pub entity_b: EntityId,
    /// Whether the link mirrors changes.
    pub enabled: bool,
    /// Attribute coverage.
    pub sync_mode: SyncMode,
    /// Handling of gradual changes.
    pub progressive_mode: ProgressiveMode,
    /// Minimum quiet time between syncs; also the echo lifetime.
    pub cooldown: Duration,
    /// Upper bound on an in-flight progressive action.
    pub action_timeout: Duration,
}

impl LinkConfig {
    /// Creates a link configuration with defaults.
    pub fn new(entity_a: impl Into<EntityId>, entity_b: impl Into<EntityId>) -> Self {
        Self {
            entity_a: entity_a.into(),
            entity_b: entity_b.into(),
            enabled: true,
            sync_mode: SyncMode::Perfect,
            progressive_mode: ProgressiveMode::Smart,
            cooldown: Duration::from_secs(1),
            action_timeout: Duration::from_secs(3),
        }
    }

    /// Sets the sync mode.
    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    /// Sets the progressive mode.
    pub fn with_progressive_mode(mut self, mode: ProgressiveMode) -> Self {
        self.progressive_mode = mode;
        self
    }

    /// Sets the cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the action timeout.
    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    /// Sets whether the link starts enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Checks that the configuration describes a usable link.
    pub fn validate(&self) -> LinkResult<()> {
        for id in [&self.entity_a, &self.entity_b] {
            if !id.is_well_formed() {
                return Err(LinkError::InvalidConfig(format!(
                    "malformed entity id: {id:?}"
                )));
            }
        }
        if self.entity_a == self.entity_b {
            return Err(LinkError::InvalidConfig(format!(
                "cannot link {} to itself",
                self.entity_a
            )));
        }
        if self.action_timeout.is_zero() {
            return Err(LinkError::InvalidConfig(
                "action timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Engine-wide tunables shared by every link.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Window during which the opposite direction is locked after a sync.
    pub direction_lock: Duration,
    /// Quiet period a progressive burst must observe before it is sent.
    pub settle_delay: Duration,
    /// Maximum wait for the link critical section.
    pub lock_timeout: Duration,
    /// Retry policy for action invocation.
    pub retry: RetryConfig,
    /// Period of the link health check.
    pub health_check_interval: Duration,
    /// Retry policy for re-acquiring missing entities.
    pub reacquire: RetryConfig,
    /// Significance thresholds.
    pub tolerances: ToleranceTable,
    /// Number of recent outcomes kept per link.
    pub history_len: usize,
}

impl EngineConfig {
    /// Creates an engine configuration with defaults.
    pub fn new() -> Self {
        Self {
            direction_lock: Duration::from_millis(500),
            settle_delay: Duration::from_millis(300),
            lock_timeout: Duration::from_secs(5),
            retry: RetryConfig::fixed(3, Duration::from_secs(2)),
            health_check_interval: Duration::from_secs(60),
            reacquire: RetryConfig::new(5)
                .with_initial_delay(Duration::from_secs(3))
                .with_max_delay(Duration::from_secs(60)),
            tolerances: ToleranceTable::default(),
            history_len: 10,
        }
    }

    /// Sets the direction lock window.
    pub fn with_direction_lock(mut self, window: Duration) -> Self {
        self.direction_lock = window;
        self
    }

    /// Sets the progressive settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the lock acquisition timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Sets the invocation retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the health check interval.
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Sets the re-acquisition retry policy.
    pub fn with_reacquire(mut self, retry: RetryConfig) -> Self {
        self.reacquire = retry;
        self
    }

    /// Sets the tolerance table.
    pub fn with_tolerances(mut self, tolerances: ToleranceTable) -> Self {
        self.tolerances = tolerances;
        self
    }

    /// Sets the history length.
    pub fn with_history_len(mut self, len: usize) -> Self {
        self.history_len = len;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier applied per retry; `1.0` keeps the delay fixed.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a configuration with exponential backoff.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a configuration with a constant delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay for a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1) as i32);

        Duration::from_secs_f64(base_delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
