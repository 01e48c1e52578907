//! # twinsync engine
//!
//! Bidirectional state mirroring between two linked device entities.
//!
//! This crate provides:
//! - Change classification against per-domain tolerances
//! - Loop suppression (echo cache, direction lock, cooldown)
//! - Instant/progressive transition detection
//! - Master/slave arbitration with cancel-and-replace supersession
//! - Attribute translation between device vocabularies
//! - Action execution with retries and statistics
//! - A periodic health monitor that re-acquires missing entities
//!
//! ## Architecture
//!
//! A [`LinkManager`] owns every [`SyncLink`]. Each link subscribes to both
//! of its entities through the [`Platform`] trait and funnels every change
//! through one pipeline:
//!
//! 1. Skip if either side is unavailable
//! 2. Drop insignificant changes (jitter within tolerance)
//! 3. Let the arbitrator absorb a slave following its master
//! 4. Run the loop guard, which records the direction on permit
//! 5. Instant changes execute under the link's critical section;
//!    progressive changes start a superseding task per direction
//!
//! ## Key Invariants
//!
//! - At most one progressive mirror task is current per direction
//! - Echo records expire after the link cooldown
//! - A translated action never carries two color models
//! - A superseded call may finish but never touches the action state
//! - Errors never escape a change callback; they end up in [`SyncStats`]

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod arbitrator;
mod classifier;
mod config;
mod direction;
mod error;
mod event;
mod executor;
mod guard;
mod health;
mod link;
mod manager;
mod platform;
mod stats;
mod transition;

pub mod schema;
pub mod translator;

pub use arbitrator::{ActionPhase, ActionState, Arbitrator, Observation};
pub use classifier::{ChangeClassifier, Significance};
pub use config::{EngineConfig, LinkConfig, ProgressiveMode, RetryConfig, SyncMode};
pub use direction::{Direction, Side};
pub use error::{LinkError, LinkResult};
pub use event::ChangeEvent;
pub use executor::{PreparedSync, SkipReason, SyncExecutor, SyncOutcome};
pub use guard::{EchoRecord, GuardDecision, LoopGuard, SuppressReason};
pub use health::{EntityHealth, HealthReport, HealthStatus};
pub use link::{EntitySummary, SyncLink, SyncStatus};
pub use manager::{LinkId, LinkManager};
pub use platform::{Platform, StateCallback, SubscriptionHandle};
pub use schema::ToleranceTable;
pub use stats::{SyncRecord, SyncStats};
pub use transition::{TransitionDetector, TransitionKind};
pub use translator::{AttributeTranslator, ExpectedState, MirrorPlan};
