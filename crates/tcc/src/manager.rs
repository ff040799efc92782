//! The transaction manager: locking, phase persistence, retry bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::TxId;
use serde::Serialize;
use store::DistributedLock;
use uuid::Uuid;

use crate::action::TccAction;
use crate::error::{Result, TccError};
use crate::transaction::{TccPhase, TccTransaction, TransactionStore};

/// How long a per-transaction phase lock is held at most.
const PHASE_LOCK_TTL: Duration = Duration::from_secs(30);

/// Drives [`TccAction`] implementations through their three phases.
///
/// Each phase runs under a per-transaction lock so confirm and cancel
/// never interleave for the same transaction. The phase field is persisted
/// before and after every action call, so a crash mid-phase leaves a record
/// the recovery sweep can act on.
pub struct TccManager {
    store: Arc<dyn TransactionStore>,
    lock: Arc<dyn DistributedLock>,
}

impl TccManager {
    pub fn new(store: Arc<dyn TransactionStore>, lock: Arc<dyn DistributedLock>) -> Self {
        Self { store, lock }
    }

    /// Starts a transaction: persists a Trying record with the serialized
    /// parameters.
    #[tracing::instrument(skip(self, params))]
    pub async fn begin<P: Serialize>(
        &self,
        tx_type: &str,
        business_key: &str,
        params: &P,
    ) -> Result<TccTransaction> {
        let tx = TccTransaction::new(tx_type, business_key, serde_json::to_value(params)?);
        self.store.insert(tx.clone()).await?;
        tracing::info!(tx_id = %tx.tx_id, tx_type, business_key, "transaction started");
        Ok(tx)
    }

    /// Runs the Try phase.
    ///
    /// A Try failure leaves the record in Trying; the driver is expected to
    /// cancel, and if it cannot, the recovery sweep will.
    #[tracing::instrument(skip(self, action))]
    pub async fn try_action<A: TccAction>(&self, action: &A, tx_id: TxId) -> Result<A::Output> {
        let (key, token) = self.acquire_phase_lock(tx_id).await?;
        let result = self.try_inner(action, tx_id).await;
        self.release_phase_lock(&key, &token).await;
        result
    }

    async fn try_inner<A: TccAction>(&self, action: &A, tx_id: TxId) -> Result<A::Output> {
        let tx = self.store.get(tx_id).await?;
        if tx.phase != TccPhase::Trying {
            return Err(TccError::InvalidPhase {
                tx_id,
                phase: tx.phase,
                operation: "try",
            });
        }
        let params: A::Params = serde_json::from_value(tx.params.clone())?;
        action.try_action(&tx, &params).await
    }

    /// Runs the Confirm phase. Idempotent: an already-Confirmed transaction
    /// is a no-op.
    ///
    /// On failure the record returns to Trying with its retry count bumped;
    /// once the budget is spent the record goes to Failed and the error
    /// becomes [`TccError::RetriesExhausted`].
    #[tracing::instrument(skip(self, action))]
    pub async fn confirm_action<A: TccAction>(&self, action: &A, tx_id: TxId) -> Result<()> {
        self.run_completion_phase(
            action,
            tx_id,
            "confirm",
            TccPhase::Confirming,
            TccPhase::Confirmed,
            TccPhase::Cancelled,
        )
        .await
    }

    /// Runs the Cancel phase. Idempotent: an already-Cancelled transaction
    /// is a no-op.
    ///
    /// Lock contention is an error here, not a silent return, so the
    /// recovery sweep sees the failure and retries later.
    #[tracing::instrument(skip(self, action))]
    pub async fn cancel_action<A: TccAction>(&self, action: &A, tx_id: TxId) -> Result<()> {
        self.run_completion_phase(
            action,
            tx_id,
            "cancel",
            TccPhase::Cancelling,
            TccPhase::Cancelled,
            TccPhase::Confirmed,
        )
        .await
    }

    /// Confirm and cancel share everything but their phase constants.
    async fn run_completion_phase<A: TccAction>(
        &self,
        action: &A,
        tx_id: TxId,
        operation: &'static str,
        in_flight: TccPhase,
        done: TccPhase,
        opposite: TccPhase,
    ) -> Result<()> {
        let (key, token) = self.acquire_phase_lock(tx_id).await?;
        let result = self
            .completion_inner(action, tx_id, operation, in_flight, done, opposite)
            .await;
        self.release_phase_lock(&key, &token).await;
        result
    }

    async fn completion_inner<A: TccAction>(
        &self,
        action: &A,
        tx_id: TxId,
        operation: &'static str,
        in_flight: TccPhase,
        done: TccPhase,
        opposite: TccPhase,
    ) -> Result<()> {
        let mut tx = self.store.get(tx_id).await?;
        if tx.phase == done {
            tracing::debug!(%tx_id, operation, "already completed, no-op");
            return Ok(());
        }
        if tx.phase == opposite || tx.phase == TccPhase::Failed {
            return Err(TccError::InvalidPhase {
                tx_id,
                phase: tx.phase,
                operation,
            });
        }

        tx.phase = in_flight;
        tx.updated_at = Utc::now();
        self.store.update(&tx).await?;

        let params: A::Params = serde_json::from_value(tx.params.clone())?;
        let outcome = match operation {
            "confirm" => action.confirm_action(&tx, &params).await,
            _ => action.cancel_action(&tx, &params).await,
        };

        match outcome {
            Ok(()) => {
                tx.phase = done;
                tx.updated_at = Utc::now();
                self.store.update(&tx).await?;
                tracing::info!(%tx_id, operation, "phase completed");
                Ok(())
            }
            Err(err) => {
                tx.retry_count += 1;
                let exhausted = tx.retry_count >= tx.max_retries;
                tx.phase = if exhausted {
                    TccPhase::Failed
                } else {
                    TccPhase::Trying
                };
                tx.updated_at = Utc::now();
                self.store.update(&tx).await?;
                tracing::warn!(
                    %tx_id,
                    operation,
                    retry_count = tx.retry_count,
                    %err,
                    "phase failed"
                );
                if exhausted {
                    Err(TccError::RetriesExhausted {
                        tx_id,
                        attempts: tx.retry_count,
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Replaces the persisted parameters, typically between Try and Confirm
    /// so the record carries the provisional ids cancel will need.
    pub async fn update_params<P: Serialize>(&self, tx_id: TxId, params: &P) -> Result<()> {
        let mut tx = self.store.get(tx_id).await?;
        tx.params = serde_json::to_value(params)?;
        tx.updated_at = Utc::now();
        self.store.update(&tx).await
    }

    /// Loads a transaction record.
    pub async fn get(&self, tx_id: TxId) -> Result<TccTransaction> {
        self.store.get(tx_id).await
    }

    /// Transactions a recovery sweep should cancel: still Trying past
    /// their own deadline as of `now`.
    pub async fn find_stuck(&self, now: DateTime<Utc>) -> Result<Vec<TccTransaction>> {
        self.store.stuck_in_trying(now).await
    }

    async fn acquire_phase_lock(&self, tx_id: TxId) -> Result<(String, String)> {
        let key = format!("tcc:lock:{tx_id}");
        let token = Uuid::new_v4().to_string();
        if !self.lock.try_lock(&key, &token, PHASE_LOCK_TTL).await? {
            return Err(TccError::Busy(key));
        }
        Ok((key, token))
    }

    async fn release_phase_lock(&self, key: &str, token: &str) {
        if let Err(err) = self.lock.release(key, token).await {
            tracing::warn!(%key, %err, "phase lock release failed");
        }
    }
}
