//! TCC error types.

use common::TxId;
use lifecycle::LifecycleError;
use store::StoreError;
use thiserror::Error;

use crate::transaction::TccPhase;

/// Errors raised by the transaction manager and the sagas it drives.
#[derive(Debug, Error)]
pub enum TccError {
    /// No transaction record with this id.
    #[error("transaction not found: {0}")]
    TransactionNotFound(TxId),

    /// The transaction is not in a phase that permits the operation.
    #[error("transaction {tx_id} is {phase}, cannot {operation}")]
    InvalidPhase {
        tx_id: TxId,
        phase: TccPhase,
        operation: &'static str,
    },

    /// A lock could not be acquired. The caller decides retry policy.
    #[error("system busy: could not acquire {0}")]
    Busy(String),

    /// A business precondition failed. Not retryable as-is.
    #[error("{0}")]
    Validation(String),

    /// A concurrent writer won. Retryable after a re-read.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Confirm or cancel failed more times than the transaction allows.
    #[error("transaction {tx_id}: retries exhausted after {attempts} attempts")]
    RetriesExhausted { tx_id: TxId, attempts: u32 },

    /// Underlying store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// State service failure.
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Transaction parameter (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for TCC results.
pub type Result<T> = std::result::Result<T, TccError>;
