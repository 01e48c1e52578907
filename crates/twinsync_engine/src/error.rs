//! Error types for the sync engine.

use crate::manager::LinkId;
use thiserror::Error;
use twinsync_model::EntityId;

/// Result type for link operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// Errors that can occur while mirroring state between linked entities.
///
/// None of these escape a change callback: the pipeline catches each one,
/// logs it and folds it into the link's statistics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    /// Entity does not resolve in the state store.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The external executor rejected an action.
    #[error("action {action} on {entity} failed: {message}")]
    ActionInvocationFailed {
        /// Target entity.
        entity: EntityId,
        /// Action name.
        action: String,
        /// Executor message.
        message: String,
    },

    /// The link critical section could not be entered in time.
    #[error("timed out waiting for the link lock")]
    LockAcquisitionTimeout,

    /// Nothing can be mirrored for this domain.
    #[error("unsupported domain: {0}")]
    UnsupportedDomain(String),

    /// An attribute could not be converted for the target.
    #[error("cannot convert {field}: {message}")]
    Conversion {
        /// Attribute key.
        field: String,
        /// What went wrong.
        message: String,
    },

    /// No link with this ID is registered.
    #[error("link not found: {0}")]
    LinkNotFound(LinkId),

    /// Link configuration is not usable.
    #[error("invalid link configuration: {0}")]
    InvalidConfig(String),

    /// Mirror task was superseded or the link was torn down.
    #[error("sync cancelled")]
    Cancelled,
}

impl LinkError {
    /// Creates an invocation failure.
    pub fn invocation(
        entity: EntityId,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ActionInvocationFailed {
            entity,
            action: action.into(),
            message: message.into(),
        }
    }

    /// Creates a conversion failure for one attribute.
    pub fn conversion(field: impl Into<String>, message: impl ToString) -> Self {
        Self::Conversion {
            field: field.into(),
            message: message.to_string(),
        }
    }

    /// Returns true if the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LinkError::ActionInvocationFailed { .. })
    }

    /// Returns true if the error means "nothing to do" rather than a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, LinkError::UnsupportedDomain(_) | LinkError::Cancelled)
    }
}
