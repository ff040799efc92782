//! Lifecycle error types.

use store::StoreError;
use thiserror::Error;

/// Errors raised by the state services.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The entity to transition does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Another writer persisted first. Retryable: re-read and resubmit.
    #[error("concurrent update lost: {0}")]
    Conflict(String),

    /// The state table rejected the transition. Retryable after a re-read:
    /// the entity may have moved to a state where the event is legal.
    #[error("{0}")]
    Transition(String),

    /// Underlying store failure.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => LifecycleError::NotFound { entity, id },
            StoreError::VersionConflict { .. } => LifecycleError::Conflict(err.to_string()),
            other => LifecycleError::Store(other),
        }
    }
}

/// Convenience type alias for lifecycle results.
pub type Result<T> = std::result::Result<T, LifecycleError>;
