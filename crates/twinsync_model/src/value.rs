//! Dynamic attribute value type.

use crate::error::{ValueError, ValueResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamic attribute value.
///
/// Device attributes arrive loosely typed from the state store. This type
/// keeps the tag so that the translator can validate each field against the
/// per-domain schema instead of guessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value. Integers from the store are widened to `f64`.
    Number(f64),
    /// Text value.
    Text(String),
    /// List of values (color tuples, option lists).
    List(Vec<Value>),
}

impl Value {
    /// Returns the type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::List(_) => "list",
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as a number.
    ///
    /// Numeric text (`"42"`, `"21.5"`) is accepted as well, since some
    /// integrations report numbers as strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Get this value as a string slice, if it is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Converts the value into a number, reporting what was found otherwise.
    pub fn to_number(&self) -> ValueResult<f64> {
        self.as_f64().ok_or(ValueError::TypeMismatch {
            expected: "number",
            found: self.type_name(),
        })
    }

    /// Converts the value into a list of exactly `len` numbers.
    pub fn to_number_list(&self, len: usize) -> ValueResult<Vec<f64>> {
        let items = self.as_list().ok_or(ValueError::TypeMismatch {
            expected: "list",
            found: self.type_name(),
        })?;
        if items.len() != len {
            return Err(ValueError::ListLength {
                expected: len,
                found: items.len(),
            });
        }
        items.iter().map(Value::to_number).collect()
    }

    /// Builds a list value from numbers.
    pub fn numbers(values: &[f64]) -> Self {
        Value::List(values.iter().copied().map(Value::Number).collect())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}
