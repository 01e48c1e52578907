//! Property-based test generators using proptest.

use proptest::prelude::*;
use twinsync_model::{attrs, EntityState, Value};

/// Strategy for light brightness values.
pub fn brightness_strategy() -> impl Strategy<Value = f64> {
    (0u8..=255).prop_map(f64::from)
}

/// Strategy for lights that are on, with at most one color model set.
pub fn light_strategy(id: &'static str) -> impl Strategy<Value = EntityState> {
    let color = prop_oneof![
        Just(None::<(&'static str, Value)>),
        (0.0f64..360.0, 0.0f64..100.0)
            .prop_map(|(h, s)| Some((attrs::HS_COLOR, Value::numbers(&[h, s])))),
        (2700.0f64..6500.0).prop_map(|k| Some((attrs::COLOR_TEMP_KELVIN, Value::Number(k.round())))),
    ];
    (brightness_strategy(), color).prop_map(move |(brightness, color)| {
        let state = EntityState::new(id, "on").with_attribute(attrs::BRIGHTNESS, brightness);
        match color {
            Some((key, value)) => state.with_attribute(key, value),
            None => state,
        }
    })
}

/// Strategy for a monotonic burst of cover positions starting at `start`.
pub fn cover_burst_strategy(start: f64) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(3u8..=10, 1..8).prop_map(move |steps| {
        let mut position = start;
        steps
            .into_iter()
            .map(|step| {
                position = (position + f64::from(step)).min(100.0);
                position
            })
            .collect()
    })
}
