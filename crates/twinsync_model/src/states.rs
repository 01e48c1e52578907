//! Well-known discrete state tokens.

/// Switched on.
pub const ON: &str = "on";
/// Switched off.
pub const OFF: &str = "off";
/// Cover fully or partially open.
pub const OPEN: &str = "open";
/// Cover moving towards open.
pub const OPENING: &str = "opening";
/// Cover closed.
pub const CLOSED: &str = "closed";
/// Cover moving towards closed.
pub const CLOSING: &str = "closing";
/// Media playing.
pub const PLAYING: &str = "playing";
/// Media paused.
pub const PAUSED: &str = "paused";
/// Media player on but idle.
pub const IDLE: &str = "idle";
/// Vacuum cleaning.
pub const CLEANING: &str = "cleaning";
/// Vacuum heading back to its dock.
pub const RETURNING: &str = "returning";
/// Vacuum docked.
pub const DOCKED: &str = "docked";
/// Climate heating mode.
pub const HEAT: &str = "heat";
/// Device cannot be reached.
pub const UNAVAILABLE: &str = "unavailable";
/// Device state is not known yet.
pub const UNKNOWN: &str = "unknown";
