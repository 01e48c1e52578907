//! Error types for attribute value access.

use thiserror::Error;

/// Result type for value conversions.
pub type ValueResult<T> = Result<T, ValueError>;

/// Errors raised when an attribute does not have the expected shape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// The value has a different type than expected.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        found: &'static str,
    },

    /// A list has the wrong number of elements.
    #[error("expected a list of {expected} numbers, found {found}")]
    ListLength {
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        found: usize,
    },

    /// A number is outside the accepted range.
    #[error("value {value} is out of range")]
    OutOfRange {
        /// The rejected value.
        value: f64,
    },
}
