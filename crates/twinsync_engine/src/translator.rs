//! Attribute translator: turns a source state into actions for the target.
//!
//! Two strategies exist:
//!
//! - **Perfect, same domain**: a per-domain field table copies every
//!   attribute the target understands (brightness, one color model, cover
//!   position and tilt, HVAC mode and temperature, ...).
//! - **Basic, or cross-domain**: the source is reduced to an "active"
//!   projection and mapped onto the closest equivalent target action.
//!
//! Each plan also carries the state the target is expected to reach, which
//! feeds both the idempotence check and the echo cache.
//!
//! Fields that fail schema validation are dropped individually; the rest of
//! the plan survives.

use crate::config::SyncMode;
use crate::error::{LinkError, LinkResult};
use crate::schema::{self, ToleranceClass, ToleranceTable};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use twinsync_model::{attrs, services, states, ActionRequest, Domain, EntityId, EntityState, Value};

/// Warmest color temperature a target is asked for.
pub const MIN_KELVIN: f64 = 2700.0;
/// Coldest color temperature a target is asked for.
pub const MAX_KELVIN: f64 = 6500.0;

/// Converts mireds to kelvin: `round(1,000,000 / mired)`, then clamps.
pub fn mired_to_kelvin(mired: f64) -> LinkResult<f64> {
    if !mired.is_finite() || mired <= 0.0 {
        return Err(LinkError::conversion(
            attrs::COLOR_TEMP,
            format!("mired must be positive, got {mired}"),
        ));
    }
    Ok(clamp_kelvin((1_000_000.0 / mired).round()))
}

/// Clamps a color temperature to the supported range.
pub fn clamp_kelvin(kelvin: f64) -> f64 {
    kelvin.clamp(MIN_KELVIN, MAX_KELVIN)
}

/// The state a target should reach once a plan is applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedState {
    /// Target entity.
    pub entity_id: EntityId,
    /// Target domain.
    pub domain: Domain,
    /// Acceptable state tokens; empty accepts any.
    pub states: Vec<String>,
    /// Attributes that must match within tolerance.
    pub attributes: BTreeMap<String, Value>,
}

impl ExpectedState {
    fn for_target(target: &EntityState) -> Self {
        Self {
            entity_id: target.entity_id.clone(),
            domain: target.domain.clone(),
            states: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    fn accept(&mut self, state: &str) {
        self.states.push(state.to_string());
    }

    /// Returns true if `actual` already satisfies this expectation.
    pub fn matches(&self, actual: &EntityState, tolerances: &ToleranceTable) -> bool {
        if actual.entity_id != self.entity_id {
            return false;
        }

        if !self.states.is_empty() {
            let state_ok = self.states.iter().any(|expected| {
                if self.domain.has_numeric_state() {
                    match (expected.parse::<f64>(), actual.numeric_state()) {
                        (Ok(x), Some(y)) => {
                            !tolerances.numbers_differ(ToleranceClass::Generic, x, y)
                        }
                        _ => expected == &actual.state,
                    }
                } else {
                    expected == &actual.state
                }
            });
            if !state_ok {
                return false;
            }
        }

        self.attributes.iter().all(|(key, value)| {
            let class = schema::lookup(&self.domain, key)
                .map_or(ToleranceClass::Generic, |spec| spec.tolerance);
            !tolerances.values_differ(class, Some(value), actual.attribute(key))
        })
    }
}

/// Ordered actions for one mirror, plus what the target should look like after.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorPlan {
    /// Actions, invoked in order.
    pub actions: Vec<ActionRequest>,
    /// Expected target state.
    pub expected: ExpectedState,
    /// Fields dropped because they failed conversion.
    pub dropped: Vec<LinkError>,
}

impl MirrorPlan {
    fn new(target: &EntityState) -> Self {
        Self {
            actions: Vec::new(),
            expected: ExpectedState::for_target(target),
            dropped: Vec::new(),
        }
    }

    /// Returns true if the plan has nothing to invoke.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn push(&mut self, action: ActionRequest) {
        self.actions.push(action);
    }

    fn expect(&mut self, key: &str, value: Value) {
        self.expected.attributes.insert(key.to_string(), value);
    }

    fn drop_field(&mut self, error: LinkError) {
        warn!(target_entity = %self.expected.entity_id, error = %error, "dropping attribute");
        self.dropped.push(error);
    }
}

/// Builds mirror plans.
#[derive(Debug, Clone, Copy)]
pub struct AttributeTranslator {
    mode: SyncMode,
}

impl AttributeTranslator {
    /// Creates a translator for a sync mode.
    pub fn new(mode: SyncMode) -> Self {
        Self { mode }
    }

    /// Translates `source` into a plan that drives `target`.
    ///
    /// Returns [`LinkError::UnsupportedDomain`] if either side has no
    /// vocabulary; callers treat that as a no-op.
    pub fn translate(&self, source: &EntityState, target: &EntityState) -> LinkResult<MirrorPlan> {
        for domain in [&source.domain, &target.domain] {
            if !domain.is_supported() {
                return Err(LinkError::UnsupportedDomain(domain.to_string()));
            }
        }

        let plan = if self.mode == SyncMode::Perfect && source.domain == target.domain {
            perfect_plan(source, target)
        } else {
            basic_plan(source, target)
        };

        debug!(
            source = %source.entity_id,
            target = %target.entity_id,
            mode = %self.mode,
            actions = plan.actions.len(),
            dropped = plan.dropped.len(),
            "translated"
        );
        Ok(plan)
    }
}

/// Reads and validates one schema-tracked attribute from the source.
fn checked(source: &EntityState, key: &str, plan: &mut MirrorPlan) -> Option<Value> {
    let value = source.attribute(key)?;
    let Some(spec) = schema::lookup(&source.domain, key) else {
        return Some(value.clone());
    };
    match schema::validate(spec, value) {
        Ok(()) => Some(value.clone()),
        Err(e) => {
            plan.drop_field(LinkError::conversion(key, e));
            None
        }
    }
}

fn checked_number(source: &EntityState, key: &str, plan: &mut MirrorPlan) -> Option<f64> {
    checked(source, key, plan).and_then(|v| v.as_f64())
}

fn perfect_plan(source: &EntityState, target: &EntityState) -> MirrorPlan {
    let mut plan = MirrorPlan::new(target);
    let id = target.entity_id.clone();

    match source.domain {
        Domain::Light => light_plan(source, id, &mut plan),
        Domain::Cover => cover_plan(source, id, &mut plan),
        Domain::Climate => climate_plan(source, id, &mut plan),
        Domain::Fan => fan_plan(source, id, &mut plan),
        Domain::MediaPlayer => media_plan(source, id, &mut plan),
        Domain::Switch | Domain::InputBoolean => match source.state.as_str() {
            states::ON => {
                plan.push(ActionRequest::new(id, services::TURN_ON));
                plan.expected.accept(states::ON);
            }
            states::OFF => {
                plan.push(ActionRequest::new(id, services::TURN_OFF));
                plan.expected.accept(states::OFF);
            }
            _ => {}
        },
        Domain::Number | Domain::InputNumber => match source.numeric_state() {
            Some(value) => {
                plan.push(ActionRequest::new(id, services::SET_VALUE).with_param(attrs::VALUE, value));
                plan.expected.accept(&source.state);
            }
            None => plan.drop_field(LinkError::conversion(
                attrs::VALUE,
                format!("state {:?} is not a number", source.state),
            )),
        },
        Domain::Select | Domain::InputSelect => select_plan(&source.state, target, id, &mut plan),
        // Vacuum has no attribute vocabulary beyond its activity.
        _ => return basic_plan(source, target),
    }

    plan
}

fn light_plan(source: &EntityState, id: EntityId, plan: &mut MirrorPlan) {
    if source.state != states::ON {
        plan.push(ActionRequest::new(id, services::TURN_OFF));
        plan.expected.accept(states::OFF);
        return;
    }

    let mut request = ActionRequest::new(id, services::TURN_ON);
    plan.expected.accept(states::ON);

    if let Some(brightness) = checked_number(source, attrs::BRIGHTNESS, plan) {
        let brightness = brightness.round().clamp(0.0, 255.0);
        request.set_param(attrs::BRIGHTNESS, brightness);
        plan.expect(attrs::BRIGHTNESS, Value::Number(brightness));
    }

    if let Some((key, value)) = pick_color(source, plan) {
        request.set_param(key, value.clone());
        plan.expect(key, value);
    }

    if let Some(effect) = checked(source, attrs::EFFECT, plan) {
        request.set_param(attrs::EFFECT, effect.clone());
        plan.expect(attrs::EFFECT, effect);
    }

    plan.push(request);
}

/// Picks exactly one color model: hs, then rgb, then xy, then temperature.
fn pick_color(source: &EntityState, plan: &mut MirrorPlan) -> Option<(&'static str, Value)> {
    for key in [attrs::HS_COLOR, attrs::RGB_COLOR, attrs::XY_COLOR] {
        if let Some(value) = checked(source, key, plan) {
            return Some((key, value));
        }
    }
    color_temperature(source, plan).map(|k| (attrs::COLOR_TEMP_KELVIN, Value::Number(k)))
}

/// Kelvin from `color_temp_kelvin`, else converted from legacy mireds.
fn color_temperature(source: &EntityState, plan: &mut MirrorPlan) -> Option<f64> {
    if let Some(kelvin) = checked_number(source, attrs::COLOR_TEMP_KELVIN, plan) {
        return Some(clamp_kelvin(kelvin.round()));
    }
    let mired = checked_number(source, attrs::COLOR_TEMP, plan)?;
    match mired_to_kelvin(mired) {
        Ok(kelvin) => Some(kelvin),
        Err(e) => {
            plan.drop_field(e);
            None
        }
    }
}

fn cover_plan(source: &EntityState, id: EntityId, plan: &mut MirrorPlan) {
    if let Some(position) = checked_number(source, attrs::CURRENT_POSITION, plan) {
        let position = position.round().clamp(0.0, 100.0);
        plan.push(
            ActionRequest::new(id.clone(), services::SET_COVER_POSITION)
                .with_param(attrs::POSITION, position),
        );
        plan.expect(attrs::CURRENT_POSITION, Value::Number(position));
    } else {
        match source.state.as_str() {
            states::OPEN | states::OPENING => {
                plan.push(ActionRequest::new(id.clone(), services::OPEN_COVER));
                plan.expected.accept(states::OPEN);
                plan.expected.accept(states::OPENING);
            }
            states::CLOSED | states::CLOSING => {
                plan.push(ActionRequest::new(id.clone(), services::CLOSE_COVER));
                plan.expected.accept(states::CLOSED);
                plan.expected.accept(states::CLOSING);
            }
            _ => {}
        }
    }

    if let Some(tilt) = checked_number(source, attrs::CURRENT_TILT_POSITION, plan) {
        let tilt = tilt.round().clamp(0.0, 100.0);
        plan.push(
            ActionRequest::new(id, services::SET_COVER_TILT_POSITION)
                .with_param(attrs::TILT_POSITION, tilt),
        );
        plan.expect(attrs::CURRENT_TILT_POSITION, Value::Number(tilt));
    }
}

fn climate_plan(source: &EntityState, id: EntityId, plan: &mut MirrorPlan) {
    plan.push(
        ActionRequest::new(id.clone(), services::SET_HVAC_MODE)
            .with_param(attrs::HVAC_MODE, source.state.as_str()),
    );
    plan.expected.accept(&source.state);

    if let Some(temperature) = checked_number(source, attrs::TEMPERATURE, plan) {
        plan.push(
            ActionRequest::new(id, services::SET_TEMPERATURE)
                .with_param(attrs::TEMPERATURE, temperature),
        );
        plan.expect(attrs::TEMPERATURE, Value::Number(temperature));
    }
}

fn fan_plan(source: &EntityState, id: EntityId, plan: &mut MirrorPlan) {
    if source.state != states::ON {
        plan.push(ActionRequest::new(id, services::TURN_OFF));
        plan.expected.accept(states::OFF);
        return;
    }

    let mut request = ActionRequest::new(id, services::TURN_ON);
    plan.expected.accept(states::ON);

    if let Some(percentage) = checked_number(source, attrs::PERCENTAGE, plan) {
        let percentage = percentage.round().clamp(0.0, 100.0);
        request.set_param(attrs::PERCENTAGE, percentage);
        plan.expect(attrs::PERCENTAGE, Value::Number(percentage));
    } else if let Some(speed) = checked(source, attrs::SPEED, plan) {
        request.set_param(attrs::SPEED, speed.clone());
        plan.expect(attrs::SPEED, speed);
    }

    if let Some(preset) = checked(source, attrs::PRESET_MODE, plan) {
        request.set_param(attrs::PRESET_MODE, preset.clone());
        plan.expect(attrs::PRESET_MODE, preset);
    }

    plan.push(request);
}

fn media_plan(source: &EntityState, id: EntityId, plan: &mut MirrorPlan) {
    let action = match source.state.as_str() {
        states::PLAYING => services::MEDIA_PLAY,
        states::PAUSED => services::MEDIA_PAUSE,
        states::OFF => services::TURN_OFF,
        _ => services::TURN_ON,
    };
    plan.push(ActionRequest::new(id.clone(), action));
    match action {
        services::TURN_ON => {
            plan.expected.accept(states::ON);
            plan.expected.accept(states::IDLE);
        }
        _ => plan.expected.accept(&source.state),
    }

    if source.state == states::OFF {
        return;
    }
    if let Some(volume) = checked_number(source, attrs::VOLUME_LEVEL, plan) {
        let volume = volume.clamp(0.0, 1.0);
        plan.push(
            ActionRequest::new(id, services::VOLUME_SET).with_param(attrs::VOLUME_LEVEL, volume),
        );
        plan.expect(attrs::VOLUME_LEVEL, Value::Number(volume));
    }
}

fn select_plan(option: &str, target: &EntityState, id: EntityId, plan: &mut MirrorPlan) {
    if let Some(options) = target_options(target) {
        if !options.iter().any(|o| o == option) {
            plan.drop_field(LinkError::conversion(
                attrs::OPTION,
                format!("{option:?} is not an option of {}", target.entity_id),
            ));
            return;
        }
    }
    plan.push(ActionRequest::new(id, services::SELECT_OPTION).with_param(attrs::OPTION, option));
    plan.expected.accept(option);
}

fn target_options(target: &EntityState) -> Option<Vec<String>> {
    let options = target.attribute(attrs::OPTIONS)?.as_list()?;
    Some(
        options
            .iter()
            .filter_map(|o| o.as_str().map(str::to_string))
            .collect(),
    )
}

/// Projects a state onto "active" (on, open, playing, cleaning, heating).
///
/// Returns `None` when the token carries no activity meaning.
pub fn is_active(state: &EntityState) -> Option<bool> {
    let token = state.state.as_str();
    match state.domain {
        Domain::Light | Domain::Switch | Domain::InputBoolean | Domain::Fan => match token {
            states::ON => Some(true),
            states::OFF => Some(false),
            _ => None,
        },
        Domain::Cover => match token {
            states::OPEN | states::OPENING => Some(true),
            states::CLOSED | states::CLOSING => Some(false),
            _ => None,
        },
        Domain::MediaPlayer => match token {
            states::PLAYING | states::ON => Some(true),
            states::OFF | states::PAUSED | states::IDLE | "standby" => Some(false),
            _ => None,
        },
        Domain::Vacuum => match token {
            states::CLEANING => Some(true),
            states::DOCKED | states::RETURNING | states::IDLE | states::PAUSED => Some(false),
            _ => None,
        },
        Domain::Climate => match token {
            states::OFF => Some(false),
            "" | states::UNKNOWN | states::UNAVAILABLE => None,
            _ => Some(true),
        },
        Domain::Number | Domain::InputNumber => {
            let min = state.number(attrs::MIN).unwrap_or(0.0);
            state.numeric_state().map(|value| value > min)
        }
        Domain::Select | Domain::InputSelect => {
            let options = target_options(state)?;
            options.first().map(|first| first != token)
        }
        Domain::Other(_) => None,
    }
}

fn basic_plan(source: &EntityState, target: &EntityState) -> MirrorPlan {
    let mut plan = MirrorPlan::new(target);
    let Some(active) = is_active(source) else {
        debug!(source = %source.entity_id, state = %source.state, "no activity projection");
        return plan;
    };
    let id = target.entity_id.clone();

    match target.domain {
        Domain::Light | Domain::Switch | Domain::InputBoolean | Domain::Fan => {
            if active {
                plan.push(ActionRequest::new(id, services::TURN_ON));
                plan.expected.accept(states::ON);
            } else {
                plan.push(ActionRequest::new(id, services::TURN_OFF));
                plan.expected.accept(states::OFF);
            }
        }
        Domain::MediaPlayer => {
            if active {
                plan.push(ActionRequest::new(id, services::TURN_ON));
                for state in [states::ON, states::PLAYING, states::PAUSED, states::IDLE] {
                    plan.expected.accept(state);
                }
            } else {
                plan.push(ActionRequest::new(id, services::TURN_OFF));
                plan.expected.accept(states::OFF);
            }
        }
        Domain::Cover => {
            if active {
                plan.push(ActionRequest::new(id, services::OPEN_COVER));
                plan.expected.accept(states::OPEN);
                plan.expected.accept(states::OPENING);
            } else {
                plan.push(ActionRequest::new(id, services::CLOSE_COVER));
                plan.expected.accept(states::CLOSED);
                plan.expected.accept(states::CLOSING);
            }
        }
        Domain::Climate => {
            let mode = if active { states::HEAT } else { states::OFF };
            plan.push(
                ActionRequest::new(id, services::SET_HVAC_MODE).with_param(attrs::HVAC_MODE, mode),
            );
            plan.expected.accept(mode);
        }
        Domain::Vacuum => {
            if active {
                plan.push(ActionRequest::new(id, services::START));
                plan.expected.accept(states::CLEANING);
            } else {
                plan.push(ActionRequest::new(id, services::RETURN_TO_BASE));
                for state in [states::RETURNING, states::DOCKED, states::IDLE] {
                    plan.expected.accept(state);
                }
            }
        }
        Domain::Number | Domain::InputNumber => {
            let value = if active {
                target.number(attrs::MAX).unwrap_or(100.0)
            } else {
                target.number(attrs::MIN).unwrap_or(0.0)
            };
            plan.push(ActionRequest::new(id, services::SET_VALUE).with_param(attrs::VALUE, value));
            plan.expected.accept(&value.to_string());
        }
        Domain::Select | Domain::InputSelect => {
            let chosen = target_options(target).and_then(|options| {
                if active {
                    options.last().cloned()
                } else {
                    options.first().cloned()
                }
            });
            match chosen {
                Some(option) => select_plan(&option, target, id, &mut plan),
                None => plan.drop_field(LinkError::conversion(
                    attrs::OPTIONS,
                    format!("{} has no options", target.entity_id),
                )),
            }
        }
        Domain::Other(_) => {}
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn perfect() -> AttributeTranslator {
        AttributeTranslator::new(SyncMode::Perfect)
    }

    fn basic() -> AttributeTranslator {
        AttributeTranslator::new(SyncMode::Basic)
    }

    fn off(id: &str) -> EntityState {
        EntityState::new(id, states::OFF)
    }

    #[test]
    fn light_turn_on_with_hs() {
        let source = EntityState::new("light.a", "on")
            .with_attribute(attrs::BRIGHTNESS, 180)
            .with_attribute(attrs::HS_COLOR, vec![30.0, 80.0]);

        let plan = perfect().translate(&source, &off("light.b")).unwrap();
        assert_eq!(plan.actions.len(), 1);
        let action = &plan.actions[0];
        assert_eq!(action.entity_id, EntityId::new("light.b"));
        assert_eq!(action.action, services::TURN_ON);
        assert_eq!(action.param(attrs::BRIGHTNESS), Some(&Value::Number(180.0)));
        assert_eq!(
            action.param(attrs::HS_COLOR),
            Some(&Value::numbers(&[30.0, 80.0]))
        );
        assert_eq!(action.params.len(), 2);
    }

    #[test]
    fn hs_wins_over_color_temperature() {
        let source = EntityState::new("light.a", "on")
            .with_attribute(attrs::HS_COLOR, vec![30.0, 80.0])
            .with_attribute(attrs::RGB_COLOR, vec![255.0, 180.0, 50.0])
            .with_attribute(attrs::COLOR_TEMP_KELVIN, 4000);

        let plan = perfect().translate(&source, &off("light.b")).unwrap();
        let action = &plan.actions[0];
        assert!(action.param(attrs::HS_COLOR).is_some());
        assert!(action.param(attrs::RGB_COLOR).is_none());
        assert!(action.param(attrs::COLOR_TEMP_KELVIN).is_none());
    }

    #[test]
    fn invalid_hs_falls_back_to_next_model() {
        let source = EntityState::new("light.a", "on")
            .with_attribute(attrs::HS_COLOR, "reddish")
            .with_attribute(attrs::COLOR_TEMP_KELVIN, 3000);

        let plan = perfect().translate(&source, &off("light.b")).unwrap();
        let action = &plan.actions[0];
        assert!(action.param(attrs::HS_COLOR).is_none());
        assert_eq!(
            action.param(attrs::COLOR_TEMP_KELVIN),
            Some(&Value::Number(3000.0))
        );
        assert_eq!(plan.dropped.len(), 1);
    }

    #[test]
    fn mired_conversion() {
        assert_eq!(mired_to_kelvin(200.0).unwrap(), 5000.0);
        assert_eq!(mired_to_kelvin(100.0).unwrap(), 6500.0);
        assert_eq!(mired_to_kelvin(500.0).unwrap(), 2700.0);
        assert!(mired_to_kelvin(0.0).is_err());
        assert!(mired_to_kelvin(-5.0).is_err());
    }

    #[test]
    fn legacy_mired_attribute() {
        let source = EntityState::new("light.a", "on")
            .with_attribute(attrs::BRIGHTNESS, 90)
            .with_attribute(attrs::COLOR_TEMP, 200);
        let plan = perfect().translate(&source, &off("light.b")).unwrap();
        assert_eq!(
            plan.actions[0].param(attrs::COLOR_TEMP_KELVIN),
            Some(&Value::Number(5000.0))
        );
    }

    #[test]
    fn non_positive_mired_drops_only_the_color() {
        let source = EntityState::new("light.a", "on")
            .with_attribute(attrs::BRIGHTNESS, 90)
            .with_attribute(attrs::COLOR_TEMP, 0);
        let plan = perfect().translate(&source, &off("light.b")).unwrap();
        let action = &plan.actions[0];
        assert_eq!(action.action, services::TURN_ON);
        assert_eq!(action.param(attrs::BRIGHTNESS), Some(&Value::Number(90.0)));
        assert!(action.param(attrs::COLOR_TEMP_KELVIN).is_none());
        assert!(matches!(plan.dropped[0], LinkError::Conversion { .. }));
    }

    #[test]
    fn kelvin_is_clamped() {
        let source =
            EntityState::new("light.a", "on").with_attribute(attrs::COLOR_TEMP_KELVIN, 9000);
        let plan = perfect().translate(&source, &off("light.b")).unwrap();
        assert_eq!(
            plan.actions[0].param(attrs::COLOR_TEMP_KELVIN),
            Some(&Value::Number(MAX_KELVIN))
        );
    }

    #[test]
    fn light_off() {
        let plan = perfect()
            .translate(&off("light.a"), &EntityState::new("light.b", "on"))
            .unwrap();
        assert_eq!(plan.actions[0].action, services::TURN_OFF);
        assert_eq!(plan.expected.states, vec![states::OFF.to_string()]);
    }

    #[test]
    fn cover_position_and_tilt() {
        let source = EntityState::new("cover.a", "open")
            .with_attribute(attrs::CURRENT_POSITION, 50)
            .with_attribute(attrs::CURRENT_TILT_POSITION, 20);
        let target = EntityState::new("cover.b", "closed");

        let plan = perfect().translate(&source, &target).unwrap();
        assert_eq!(plan.actions.len(), 2);
        assert_eq!(plan.actions[0].action, services::SET_COVER_POSITION);
        assert_eq!(plan.actions[0].param(attrs::POSITION), Some(&Value::Number(50.0)));
        assert_eq!(plan.actions[1].action, services::SET_COVER_TILT_POSITION);
    }

    #[test]
    fn cover_without_position_opens() {
        let source = EntityState::new("cover.a", "opening");
        let plan = perfect()
            .translate(&source, &EntityState::new("cover.b", "closed"))
            .unwrap();
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].action, services::OPEN_COVER);
    }

    #[test]
    fn climate_mode_then_temperature() {
        let source = EntityState::new("climate.a", "heat").with_attribute(attrs::TEMPERATURE, 21.5);
        let plan = perfect()
            .translate(&source, &EntityState::new("climate.b", "off"))
            .unwrap();
        assert_eq!(plan.actions[0].action, services::SET_HVAC_MODE);
        assert_eq!(plan.actions[0].param(attrs::HVAC_MODE), Some(&Value::from("heat")));
        assert_eq!(plan.actions[1].action, services::SET_TEMPERATURE);
        assert_eq!(plan.actions[1].param(attrs::TEMPERATURE), Some(&Value::Number(21.5)));
    }

    #[test]
    fn fan_percentage_and_preset() {
        let source = EntityState::new("fan.a", "on")
            .with_attribute(attrs::PERCENTAGE, 66)
            .with_attribute(attrs::PRESET_MODE, "breeze");
        let plan = perfect().translate(&source, &off("fan.b")).unwrap();
        let action = &plan.actions[0];
        assert_eq!(action.param(attrs::PERCENTAGE), Some(&Value::Number(66.0)));
        assert_eq!(action.param(attrs::PRESET_MODE), Some(&Value::from("breeze")));
    }

    #[test]
    fn media_play_and_volume() {
        let source =
            EntityState::new("media_player.a", "playing").with_attribute(attrs::VOLUME_LEVEL, 0.4);
        let plan = perfect().translate(&source, &off("media_player.b")).unwrap();
        assert_eq!(plan.actions[0].action, services::MEDIA_PLAY);
        assert_eq!(plan.actions[1].action, services::VOLUME_SET);
    }

    #[test]
    fn select_passthrough_checks_options() {
        let target = EntityState::new("input_select.b", "low")
            .with_attribute(attrs::OPTIONS, vec!["low", "mid", "high"]);

        let plan = perfect()
            .translate(&EntityState::new("input_select.a", "mid"), &target)
            .unwrap();
        assert_eq!(plan.actions[0].param(attrs::OPTION), Some(&Value::from("mid")));

        let plan = perfect()
            .translate(&EntityState::new("input_select.a", "turbo"), &target)
            .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.dropped.len(), 1);
    }

    #[test]
    fn number_passthrough() {
        let plan = perfect()
            .translate(
                &EntityState::new("input_number.a", "42.5"),
                &EntityState::new("input_number.b", "0"),
            )
            .unwrap();
        assert_eq!(plan.actions[0].action, services::SET_VALUE);
        assert_eq!(plan.actions[0].param(attrs::VALUE), Some(&Value::Number(42.5)));
    }

    #[test]
    fn cross_domain_uses_activity() {
        let plan = perfect()
            .translate(
                &EntityState::new("light.a", "on").with_attribute(attrs::BRIGHTNESS, 10),
                &EntityState::new("cover.b", "closed"),
            )
            .unwrap();
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].action, services::OPEN_COVER);
        assert!(plan.actions[0].params.is_empty());

        let plan = perfect()
            .translate(&EntityState::new("vacuum.a", "cleaning"), &off("switch.b"))
            .unwrap();
        assert_eq!(plan.actions[0].action, services::TURN_ON);

        let plan = perfect()
            .translate(&EntityState::new("media_player.a", "playing"), &off("climate.b"))
            .unwrap();
        assert_eq!(plan.actions[0].param(attrs::HVAC_MODE), Some(&Value::from("heat")));
    }

    #[test]
    fn basic_mode_ignores_attributes() {
        let source = EntityState::new("light.a", "on").with_attribute(attrs::BRIGHTNESS, 10);
        let plan = basic().translate(&source, &off("light.b")).unwrap();
        assert_eq!(plan.actions[0].action, services::TURN_ON);
        assert!(plan.actions[0].params.is_empty());
    }

    #[test]
    fn binary_proxy_for_numbers_and_selects() {
        let number = EntityState::new("input_number.b", "3")
            .with_attribute(attrs::MIN, 1)
            .with_attribute(attrs::MAX, 9);
        let plan = basic().translate(&EntityState::new("switch.a", "on"), &number).unwrap();
        assert_eq!(plan.actions[0].param(attrs::VALUE), Some(&Value::Number(9.0)));
        let plan = basic().translate(&off("switch.a"), &number).unwrap();
        assert_eq!(plan.actions[0].param(attrs::VALUE), Some(&Value::Number(1.0)));

        let select = EntityState::new("select.b", "low")
            .with_attribute(attrs::OPTIONS, vec!["low", "mid", "high"]);
        let plan = basic().translate(&EntityState::new("fan.a", "on"), &select).unwrap();
        assert_eq!(plan.actions[0].param(attrs::OPTION), Some(&Value::from("high")));
        let plan = basic().translate(&off("fan.a"), &select).unwrap();
        assert_eq!(plan.actions[0].param(attrs::OPTION), Some(&Value::from("low")));
    }

    #[test]
    fn unsupported_domain_is_reported() {
        let err = perfect()
            .translate(&EntityState::new("sensor.a", "12"), &off("light.b"))
            .unwrap_err();
        assert_eq!(err, LinkError::UnsupportedDomain("sensor".into()));
        assert!(err.is_benign());
    }

    #[test]
    fn expected_state_matches_within_tolerance() {
        let source = EntityState::new("light.a", "on").with_attribute(attrs::BRIGHTNESS, 180);
        let plan = perfect().translate(&source, &off("light.b")).unwrap();
        let tolerances = ToleranceTable::default();

        let close = EntityState::new("light.b", "on").with_attribute(attrs::BRIGHTNESS, 178);
        let far = EntityState::new("light.b", "on").with_attribute(attrs::BRIGHTNESS, 150);
        assert!(plan.expected.matches(&close, &tolerances));
        assert!(!plan.expected.matches(&far, &tolerances));
        assert!(!plan.expected.matches(&off("light.b"), &tolerances));
    }

    proptest! {
        #[test]
        fn never_two_color_models(
            hs in proptest::option::of((0.0f64..360.0, 0.0f64..100.0)),
            rgb in proptest::option::of((0.0f64..255.0, 0.0f64..255.0, 0.0f64..255.0)),
            xy in proptest::option::of((0.0f64..1.0, 0.0f64..1.0)),
            kelvin in proptest::option::of(1000.0f64..10000.0),
            mired in proptest::option::of(-50.0f64..600.0),
        ) {
            let mut source = EntityState::new("light.a", "on");
            if let Some((h, s)) = hs {
                source = source.with_attribute(attrs::HS_COLOR, vec![h, s]);
            }
            if let Some((r, g, b)) = rgb {
                source = source.with_attribute(attrs::RGB_COLOR, vec![r, g, b]);
            }
            if let Some((x, y)) = xy {
                source = source.with_attribute(attrs::XY_COLOR, vec![x, y]);
            }
            if let Some(k) = kelvin {
                source = source.with_attribute(attrs::COLOR_TEMP_KELVIN, k);
            }
            if let Some(m) = mired {
                source = source.with_attribute(attrs::COLOR_TEMP, m);
            }

            let plan = perfect().translate(&source, &off("light.b")).unwrap();
            let models = [attrs::HS_COLOR, attrs::RGB_COLOR, attrs::XY_COLOR, attrs::COLOR_TEMP_KELVIN, attrs::COLOR_TEMP]
                .iter()
                .filter(|key| plan.actions[0].param(key).is_some())
                .count();
            prop_assert!(models <= 1);
        }
    }
}
