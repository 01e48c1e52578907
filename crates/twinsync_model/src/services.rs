//! Action names understood by the external executor.

/// Turn an entity on (lights, switches, fans, media players).
pub const TURN_ON: &str = "turn_on";
/// Turn an entity off.
pub const TURN_OFF: &str = "turn_off";
/// Open a cover.
pub const OPEN_COVER: &str = "open_cover";
/// Close a cover.
pub const CLOSE_COVER: &str = "close_cover";
/// Move a cover to a position.
pub const SET_COVER_POSITION: &str = "set_cover_position";
/// Tilt a cover.
pub const SET_COVER_TILT_POSITION: &str = "set_cover_tilt_position";
/// Change HVAC mode.
pub const SET_HVAC_MODE: &str = "set_hvac_mode";
/// Change target temperature.
pub const SET_TEMPERATURE: &str = "set_temperature";
/// Start media playback.
pub const MEDIA_PLAY: &str = "media_play";
/// Pause media playback.
pub const MEDIA_PAUSE: &str = "media_pause";
/// Set media volume.
pub const VOLUME_SET: &str = "volume_set";
/// Start a vacuum.
pub const START: &str = "start";
/// Send a vacuum back to its dock.
pub const RETURN_TO_BASE: &str = "return_to_base";
/// Set a numeric entity.
pub const SET_VALUE: &str = "set_value";
/// Select an option.
pub const SELECT_OPTION: &str = "select_option";
