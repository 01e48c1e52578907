//! Per-domain attribute schema and significance tolerances.
//!
//! Every domain the engine understands declares which attributes it tracks,
//! what shape each one has, which tolerance class decides whether a change is
//! meaningful, and whether the attribute moves gradually after a command.

use twinsync_model::{attrs, Domain, Value};

/// Tolerance class of a tracked attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceClass {
    /// Light brightness (0..=255).
    Brightness,
    /// Color temperature (kelvin or mired).
    ColorTemp,
    /// Cover position or tilt (percent).
    Position,
    /// Media volume (0.0..=1.0).
    Volume,
    /// CIE xy chromaticity components.
    Chromaticity,
    /// Any other numeric attribute.
    Generic,
    /// Compared for equality.
    Exact,
}

/// Expected shape of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// A single number.
    Number,
    /// A list of exactly `n` numbers.
    NumberList(usize),
    /// Text.
    Text,
}

/// Schema entry for one attribute.
#[derive(Debug, Clone, Copy)]
pub struct AttributeSpec {
    /// Attribute key.
    pub key: &'static str,
    /// Value shape.
    pub kind: ValueKind,
    /// How differences are judged.
    pub tolerance: ToleranceClass,
    /// Whether the attribute ramps over time after a command.
    pub progressive: bool,
}

const fn spec(
    key: &'static str,
    kind: ValueKind,
    tolerance: ToleranceClass,
    progressive: bool,
) -> AttributeSpec {
    AttributeSpec {
        key,
        kind,
        tolerance,
        progressive,
    }
}

const LIGHT: &[AttributeSpec] = &[
    spec(attrs::BRIGHTNESS, ValueKind::Number, ToleranceClass::Brightness, true),
    spec(attrs::COLOR_TEMP_KELVIN, ValueKind::Number, ToleranceClass::ColorTemp, true),
    spec(attrs::COLOR_TEMP, ValueKind::Number, ToleranceClass::ColorTemp, true),
    spec(attrs::HS_COLOR, ValueKind::NumberList(2), ToleranceClass::Generic, true),
    spec(attrs::RGB_COLOR, ValueKind::NumberList(3), ToleranceClass::Generic, true),
    spec(attrs::XY_COLOR, ValueKind::NumberList(2), ToleranceClass::Chromaticity, true),
    spec(attrs::EFFECT, ValueKind::Text, ToleranceClass::Exact, false),
];

const COVER: &[AttributeSpec] = &[
    spec(attrs::CURRENT_POSITION, ValueKind::Number, ToleranceClass::Position, true),
    spec(attrs::CURRENT_TILT_POSITION, ValueKind::Number, ToleranceClass::Position, true),
];

const CLIMATE: &[AttributeSpec] = &[
    spec(attrs::TEMPERATURE, ValueKind::Number, ToleranceClass::Generic, true),
];

const FAN: &[AttributeSpec] = &[
    spec(attrs::PERCENTAGE, ValueKind::Number, ToleranceClass::Generic, true),
    spec(attrs::SPEED, ValueKind::Text, ToleranceClass::Exact, false),
    spec(attrs::PRESET_MODE, ValueKind::Text, ToleranceClass::Exact, false),
];

const MEDIA_PLAYER: &[AttributeSpec] = &[
    spec(attrs::VOLUME_LEVEL, ValueKind::Number, ToleranceClass::Volume, false),
];

/// Returns the tracked attributes of a domain.
pub fn attributes_for(domain: &Domain) -> &'static [AttributeSpec] {
    match domain {
        Domain::Light => LIGHT,
        Domain::Cover => COVER,
        Domain::Climate => CLIMATE,
        Domain::Fan => FAN,
        Domain::MediaPlayer => MEDIA_PLAYER,
        _ => &[],
    }
}

/// Looks up the schema entry for one attribute of a domain.
pub fn lookup(domain: &Domain, key: &str) -> Option<&'static AttributeSpec> {
    attributes_for(domain).iter().find(|spec| spec.key == key)
}

/// Checks that a value has the shape the schema expects.
pub fn validate(spec: &AttributeSpec, value: &Value) -> twinsync_model::ValueResult<()> {
    match spec.kind {
        ValueKind::Number => value.to_number().map(|_| ()),
        ValueKind::NumberList(len) => value.to_number_list(len).map(|_| ()),
        ValueKind::Text => match value {
            Value::Text(_) => Ok(()),
            other => Err(twinsync_model::ValueError::TypeMismatch {
                expected: "text",
                found: other.type_name(),
            }),
        },
    }
}

/// Significance thresholds.
///
/// A numeric delta at or above the threshold is significant; anything below
/// is noise. The defaults are configurable because devices disagree on how
/// much jitter they report.
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceTable {
    /// Brightness units (of 255).
    pub brightness: f64,
    /// Color temperature units.
    pub color_temp: f64,
    /// Cover position percent.
    pub position: f64,
    /// Volume fraction.
    pub volume: f64,
    /// xy chromaticity units.
    pub chromaticity: f64,
    /// Any other number.
    pub generic: f64,
}

impl Default for ToleranceTable {
    fn default() -> Self {
        Self {
            brightness: 5.0,
            color_temp: 10.0,
            position: 3.0,
            volume: 0.05,
            chromaticity: 0.005,
            generic: 2.0,
        }
    }
}

/// Slack absorbing float rounding at the threshold (0.30 - 0.25 < 0.05).
const EPSILON: f64 = 1e-9;

impl ToleranceTable {
    /// Returns the threshold of a class.
    pub fn threshold(&self, class: ToleranceClass) -> f64 {
        match class {
            ToleranceClass::Brightness => self.brightness,
            ToleranceClass::ColorTemp => self.color_temp,
            ToleranceClass::Position => self.position,
            ToleranceClass::Volume => self.volume,
            ToleranceClass::Chromaticity => self.chromaticity,
            ToleranceClass::Generic => self.generic,
            ToleranceClass::Exact => 0.0,
        }
    }

    /// Returns true if two numbers differ meaningfully.
    pub fn numbers_differ(&self, class: ToleranceClass, a: f64, b: f64) -> bool {
        let threshold = self.threshold(class);
        if threshold <= 0.0 {
            return a != b;
        }
        (a - b).abs() + EPSILON >= threshold
    }

    /// Returns true if two attribute values differ meaningfully.
    ///
    /// Absent and present differ. Lists differ if their lengths differ or any
    /// element differs. Non-numeric values compare for equality.
    pub fn values_differ(
        &self,
        class: ToleranceClass,
        a: Option<&Value>,
        b: Option<&Value>,
    ) -> bool {
        match (a, b) {
            (None, None) => false,
            (Some(_), None) | (None, Some(_)) => true,
            (Some(Value::List(xs)), Some(Value::List(ys))) => {
                xs.len() != ys.len()
                    || xs
                        .iter()
                        .zip(ys)
                        .any(|(x, y)| self.values_differ(class, Some(x), Some(y)))
            }
            (Some(x), Some(y)) => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) if class != ToleranceClass::Exact => {
                    self.numbers_differ(class, x, y)
                }
                _ => x != y,
            },
        }
    }
}
