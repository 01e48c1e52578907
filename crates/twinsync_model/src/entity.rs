//! Entity identifiers, device domains and state snapshots.

use crate::states;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of an entity in the external state store (`light.kitchen`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Creates an entity ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the device domain encoded in the identifier prefix.
    pub fn domain(&self) -> Domain {
        Domain::from_entity_id(&self.0)
    }

    /// Returns true if the identifier has the `domain.object` shape.
    pub fn is_well_formed(&self) -> bool {
        match self.0.split_once('.') {
            Some((domain, object)) => !domain.is_empty() && !object.is_empty(),
            None => false,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Device class of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Domain {
    /// Dimmable / colored lights.
    Light,
    /// Plain on/off switches.
    Switch,
    /// Helper booleans.
    InputBoolean,
    /// Fans with speed percentage and presets.
    Fan,
    /// Motorized covers (blinds, curtains, garage doors).
    Cover,
    /// Thermostats and HVAC units.
    Climate,
    /// Media players.
    MediaPlayer,
    /// Robot vacuums.
    Vacuum,
    /// Numeric entities.
    Number,
    /// Helper numbers.
    InputNumber,
    /// Selectable option entities.
    Select,
    /// Helper selects.
    InputSelect,
    /// Any domain the engine has no vocabulary for.
    Other(String),
}

impl Domain {
    /// Parses the domain from an entity identifier.
    pub fn from_entity_id(entity_id: &str) -> Self {
        let prefix = entity_id.split_once('.').map_or(entity_id, |(d, _)| d);
        Self::from(prefix.to_string())
    }

    /// Returns the canonical domain name.
    pub fn as_str(&self) -> &str {
        match self {
            Domain::Light => "light",
            Domain::Switch => "switch",
            Domain::InputBoolean => "input_boolean",
            Domain::Fan => "fan",
            Domain::Cover => "cover",
            Domain::Climate => "climate",
            Domain::MediaPlayer => "media_player",
            Domain::Vacuum => "vacuum",
            Domain::Number => "number",
            Domain::InputNumber => "input_number",
            Domain::Select => "select",
            Domain::InputSelect => "input_select",
            Domain::Other(name) => name,
        }
    }

    /// Returns true for domains whose state token is a number.
    pub fn has_numeric_state(&self) -> bool {
        matches!(self, Domain::Number | Domain::InputNumber)
    }

    /// Returns true if the engine knows how to drive this domain.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Domain::Other(_))
    }
}

impl From<String> for Domain {
    fn from(name: String) -> Self {
        match name.as_str() {
            "light" => Domain::Light,
            "switch" => Domain::Switch,
            "input_boolean" => Domain::InputBoolean,
            "fan" => Domain::Fan,
            "cover" => Domain::Cover,
            "climate" => Domain::Climate,
            "media_player" => Domain::MediaPlayer,
            "vacuum" => Domain::Vacuum,
            "number" => Domain::Number,
            "input_number" => Domain::InputNumber,
            "select" => Domain::Select,
            "input_select" => Domain::InputSelect,
            _ => Domain::Other(name),
        }
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.as_str().to_string()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable snapshot of one entity as reported by the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EntityStateRepr")]
pub struct EntityState {
    /// Entity identifier.
    pub entity_id: EntityId,
    /// Device class, derived from the identifier.
    pub domain: Domain,
    /// Discrete state token (`on`, `open`, `heat`, `42.0`, ...).
    pub state: String,
    /// Attribute map.
    pub attributes: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
struct EntityStateRepr {
    entity_id: EntityId,
    state: String,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
}

impl From<EntityStateRepr> for EntityState {
    fn from(repr: EntityStateRepr) -> Self {
        let mut state = EntityState::new(repr.entity_id, repr.state);
        state.attributes = repr.attributes;
        state
    }
}

impl EntityState {
    /// Creates a snapshot with no attributes.
    pub fn new(entity_id: impl Into<EntityId>, state: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        Self {
            domain: entity_id.domain(),
            entity_id,
            state: state.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns an attribute, treating explicit nulls as absent.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    /// Returns a numeric attribute.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.attribute(key).and_then(Value::as_f64)
    }

    /// Returns the state token parsed as a number.
    pub fn numeric_state(&self) -> Option<f64> {
        self.state.trim().parse::<f64>().ok().filter(|n| n.is_finite())
    }

    /// Returns true if the device reports that it cannot be reached.
    pub fn is_unavailable(&self) -> bool {
        self.state == states::UNAVAILABLE || self.state == states::UNKNOWN
    }
}
