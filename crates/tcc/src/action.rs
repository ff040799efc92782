//! The capability interface every saga implements.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::transaction::TccTransaction;

/// One saga's three phases.
///
/// Implementations are selected by business type at `begin` time. Each
/// phase receives the transaction record and its deserialized parameters;
/// the manager handles locking, phase persistence, and retry bookkeeping
/// around these calls.
///
/// Confirm and cancel must be idempotent: the recovery sweep may replay
/// them, and a phase that already took effect must be a no-op on replay.
#[async_trait]
pub trait TccAction: Send + Sync {
    /// Parameters persisted with the transaction record.
    type Params: Serialize + DeserializeOwned + Send + Sync;
    /// What a successful Try yields to the driver.
    type Output: Send;

    /// Reserves resources and creates provisional state.
    async fn try_action(&self, tx: &TccTransaction, params: &Self::Params)
    -> Result<Self::Output>;

    /// Makes the reservation durable.
    async fn confirm_action(&self, tx: &TccTransaction, params: &Self::Params) -> Result<()>;

    /// Releases everything Try reserved.
    async fn cancel_action(&self, tx: &TccTransaction, params: &Self::Params) -> Result<()>;
}
