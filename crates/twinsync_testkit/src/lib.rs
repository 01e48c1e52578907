//! # twinsync testkit
//!
//! Test utilities for twinsync.
//!
//! This crate provides:
//! - [`MemoryPlatform`], an in-memory state store with subscriptions,
//!   recorded invocations, simulated device confirmation and failure
//!   injection
//! - State fixtures and paused-clock timing helpers
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use twinsync_testkit::prelude::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn mirrors_a_light() {
//!     let platform = Arc::new(MemoryPlatform::with_states([
//!         light_off("light.a"),
//!         light_off("light.b"),
//!     ]));
//!     let manager = LinkManager::new(platform.clone(), EngineConfig::default());
//!     manager.add_link(link("light.a", "light.b")).await.unwrap();
//!     platform.set_state(light_on("light.a", 180.0));
//!     wait_ms(10).await;
//!     assert_eq!(platform.invocations_for("light.b").len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod device;
pub mod fixtures;
pub mod generators;
pub mod platform;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::device::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::platform::*;
}

pub use fixtures::*;
pub use platform::MemoryPlatform;
