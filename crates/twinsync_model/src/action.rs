//! Action requests sent to the external executor.

use crate::entity::{Domain, EntityId};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A request to actuate one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Target entity.
    pub entity_id: EntityId,
    /// Domain the action belongs to.
    pub domain: Domain,
    /// Action name (`turn_on`, `set_cover_position`, ...).
    pub action: String,
    /// Action parameters.
    pub params: BTreeMap<String, Value>,
}

impl ActionRequest {
    /// Creates a request for `entity_id` in its own domain.
    pub fn new(entity_id: EntityId, action: impl Into<String>) -> Self {
        Self {
            domain: entity_id.domain(),
            entity_id,
            action: action.into(),
            params: BTreeMap::new(),
        }
    }

    /// Adds a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Sets a parameter in place.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(key.into(), value.into());
    }

    /// Returns a parameter.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

impl fmt::Display for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.domain, self.action, self.entity_id)?;
        if !self.params.is_empty() {
            write!(f, " {{")?;
            for (i, (key, value)) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}: {value}")?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}
