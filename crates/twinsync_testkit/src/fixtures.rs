//! State fixtures and timing helpers.

use std::time::Duration;
use twinsync_engine::{EngineConfig, LinkConfig, RetryConfig};
use twinsync_model::{attrs, EntityState};

/// A light that is off.
pub fn light_off(id: &str) -> EntityState {
    EntityState::new(id, "off")
}

/// A light that is on at `brightness`.
pub fn light_on(id: &str, brightness: f64) -> EntityState {
    EntityState::new(id, "on").with_attribute(attrs::BRIGHTNESS, brightness)
}

/// A light that is on at `brightness` with a hue/saturation color.
pub fn light_hs(id: &str, brightness: f64, hue: f64, saturation: f64) -> EntityState {
    light_on(id, brightness).with_attribute(attrs::HS_COLOR, vec![hue, saturation])
}

/// A cover at `position` percent.
pub fn cover(id: &str, position: f64) -> EntityState {
    let state = if position > 0.0 { "open" } else { "closed" };
    EntityState::new(id, state).with_attribute(attrs::CURRENT_POSITION, position)
}

/// An entity reporting `unavailable`.
pub fn unavailable(id: &str) -> EntityState {
    EntityState::new(id, "unavailable")
}

/// Engine configuration with the default timings and no retry delay.
pub fn fast_engine() -> EngineConfig {
    EngineConfig::new().with_retry(RetryConfig::fixed(3, Duration::from_millis(10)))
}

/// A link between `a` and `b` with default settings.
pub fn link(a: &str, b: &str) -> LinkConfig {
    LinkConfig::new(a, b)
}

/// Sleeps on the tokio clock; with a paused clock this advances time once
/// every task is idle.
pub async fn wait(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Sleeps for `ms` milliseconds on the tokio clock.
pub async fn wait_ms(ms: u64) {
    wait(Duration::from_millis(ms)).await;
}
