//! Well-known attribute keys.

/// Light brightness, 0..=255.
pub const BRIGHTNESS: &str = "brightness";
/// Color temperature in kelvin.
pub const COLOR_TEMP_KELVIN: &str = "color_temp_kelvin";
/// Legacy color temperature in mireds.
pub const COLOR_TEMP: &str = "color_temp";
/// Hue (degrees) and saturation (percent).
pub const HS_COLOR: &str = "hs_color";
/// Red, green, blue components.
pub const RGB_COLOR: &str = "rgb_color";
/// CIE xy chromaticity.
pub const XY_COLOR: &str = "xy_color";
/// Active light effect.
pub const EFFECT: &str = "effect";

/// Reported cover position, 0..=100.
pub const CURRENT_POSITION: &str = "current_position";
/// Reported cover tilt, 0..=100.
pub const CURRENT_TILT_POSITION: &str = "current_tilt_position";
/// Requested cover position.
pub const POSITION: &str = "position";
/// Requested cover tilt.
pub const TILT_POSITION: &str = "tilt_position";

/// Climate target temperature.
pub const TEMPERATURE: &str = "temperature";
/// Requested HVAC mode.
pub const HVAC_MODE: &str = "hvac_mode";

/// Fan speed percentage.
pub const PERCENTAGE: &str = "percentage";
/// Legacy named fan speed.
pub const SPEED: &str = "speed";
/// Fan preset mode.
pub const PRESET_MODE: &str = "preset_mode";

/// Media player volume, 0.0..=1.0.
pub const VOLUME_LEVEL: &str = "volume_level";

/// Numeric entity value.
pub const VALUE: &str = "value";
/// Numeric entity lower bound.
pub const MIN: &str = "min";
/// Numeric entity upper bound.
pub const MAX: &str = "max";
/// Selectable entity option list.
pub const OPTIONS: &str = "options";
/// Selected option.
pub const OPTION: &str = "option";
