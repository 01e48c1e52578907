//! Simulated device behavior.
//!
//! Applies an action to a state snapshot the way a well-behaved device would
//! report it afterwards. Used by [`MemoryPlatform`](crate::MemoryPlatform)
//! when auto-apply is on.

use twinsync_model::{attrs, services, states, ActionRequest, EntityState, Value};

const COLOR_MODELS: [&str; 5] = [
    attrs::HS_COLOR,
    attrs::RGB_COLOR,
    attrs::XY_COLOR,
    attrs::COLOR_TEMP_KELVIN,
    attrs::COLOR_TEMP,
];

/// Returns the state `current` reaches once `request` is carried out.
pub fn apply_action(current: &EntityState, request: &ActionRequest) -> EntityState {
    let mut next = current.clone();
    let param = |key: &str| request.param(key).cloned();

    match request.action.as_str() {
        services::TURN_ON => {
            next.state = states::ON.to_string();
            if COLOR_MODELS.iter().any(|key| request.param(key).is_some()) {
                for key in COLOR_MODELS {
                    next.attributes.remove(key);
                }
            }
            for (key, value) in &request.params {
                next.attributes.insert(key.clone(), value.clone());
            }
        }
        services::TURN_OFF => next.state = states::OFF.to_string(),
        services::OPEN_COVER => {
            next.state = states::OPEN.to_string();
            if next.attributes.contains_key(attrs::CURRENT_POSITION) {
                next.attributes
                    .insert(attrs::CURRENT_POSITION.into(), Value::Number(100.0));
            }
        }
        services::CLOSE_COVER => {
            next.state = states::CLOSED.to_string();
            if next.attributes.contains_key(attrs::CURRENT_POSITION) {
                next.attributes
                    .insert(attrs::CURRENT_POSITION.into(), Value::Number(0.0));
            }
        }
        services::SET_COVER_POSITION => {
            if let Some(position) = param(attrs::POSITION) {
                let open = position.as_f64().is_some_and(|p| p > 0.0);
                next.state = if open { states::OPEN } else { states::CLOSED }.to_string();
                next.attributes.insert(attrs::CURRENT_POSITION.into(), position);
            }
        }
        services::SET_COVER_TILT_POSITION => {
            if let Some(tilt) = param(attrs::TILT_POSITION) {
                next.attributes
                    .insert(attrs::CURRENT_TILT_POSITION.into(), tilt);
            }
        }
        services::SET_HVAC_MODE => {
            if let Some(mode) = param(attrs::HVAC_MODE).and_then(|m| m.as_str().map(str::to_string)) {
                next.state = mode;
            }
        }
        services::SET_TEMPERATURE => {
            if let Some(temperature) = param(attrs::TEMPERATURE) {
                next.attributes.insert(attrs::TEMPERATURE.into(), temperature);
            }
        }
        services::MEDIA_PLAY => next.state = states::PLAYING.to_string(),
        services::MEDIA_PAUSE => next.state = states::PAUSED.to_string(),
        services::VOLUME_SET => {
            if let Some(volume) = param(attrs::VOLUME_LEVEL) {
                next.attributes.insert(attrs::VOLUME_LEVEL.into(), volume);
            }
        }
        services::START => next.state = states::CLEANING.to_string(),
        services::RETURN_TO_BASE => next.state = states::RETURNING.to_string(),
        services::SET_VALUE => {
            if let Some(value) = param(attrs::VALUE) {
                next.state = value.to_string();
            }
        }
        services::SELECT_OPTION => {
            if let Some(option) = param(attrs::OPTION).and_then(|o| o.as_str().map(str::to_string)) {
                next.state = option;
            }
        }
        _ => {}
    }

    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinsync_model::EntityId;

    #[test]
    fn turn_on_replaces_color_model() {
        let current = EntityState::new("light.b", "off").with_attribute(attrs::COLOR_TEMP_KELVIN, 3000);
        let request = ActionRequest::new(EntityId::new("light.b"), services::TURN_ON)
            .with_param(attrs::BRIGHTNESS, 180)
            .with_param(attrs::HS_COLOR, vec![30.0, 80.0]);

        let next = apply_action(&current, &request);
        assert_eq!(next.state, "on");
        assert_eq!(next.number(attrs::BRIGHTNESS), Some(180.0));
        assert!(next.attribute(attrs::COLOR_TEMP_KELVIN).is_none());
    }

    #[test]
    fn cover_position() {
        let current = EntityState::new("cover.b", "closed").with_attribute(attrs::CURRENT_POSITION, 0);
        let request = ActionRequest::new(EntityId::new("cover.b"), services::SET_COVER_POSITION)
            .with_param(attrs::POSITION, 50);

        let next = apply_action(&current, &request);
        assert_eq!(next.state, "open");
        assert_eq!(next.number(attrs::CURRENT_POSITION), Some(50.0));
    }

    #[test]
    fn number_value() {
        let current = EntityState::new("input_number.b", "0");
        let request = ActionRequest::new(EntityId::new("input_number.b"), services::SET_VALUE)
            .with_param(attrs::VALUE, 42.5);
        assert_eq!(apply_action(&current, &request).numeric_state(), Some(42.5));
    }
}
