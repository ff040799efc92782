//! Store error types.

use common::SkuId;
use thiserror::Error;

/// Errors raised by the infrastructure stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The optimistic version check failed; the caller must re-read and
    /// retry.
    #[error("version conflict on {entity} {id}: expected {expected}, stored {actual}")]
    VersionConflict {
        entity: &'static str,
        id: String,
        expected: u64,
        actual: u64,
    },

    /// A row with the same unique key already exists.
    #[error("{entity} already exists: {id}")]
    Duplicate { entity: &'static str, id: String },

    /// The stock counter for this SKU was never provisioned.
    #[error("stock counter not provisioned for SKU {0}")]
    Unprovisioned(SkuId),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
