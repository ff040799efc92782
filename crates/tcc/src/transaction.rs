//! The persisted TCC transaction record and its store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::TxId;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TccError};

/// Default attempt budget for confirm/cancel before a transaction is
/// marked failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default seconds a record may sit in Trying before the recovery sweep
/// treats it as stuck.
pub const DEFAULT_TX_TIMEOUT_SECS: u32 = 60;

/// Where a transaction stands in its three-phase life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TccPhase {
    /// Try ran (or is running); neither confirm nor cancel has completed.
    Trying,
    /// Confirm is in flight.
    Confirming,
    /// Confirm completed. Terminal.
    Confirmed,
    /// Cancel is in flight.
    Cancelling,
    /// Cancel completed. Terminal.
    Cancelled,
    /// The retry budget ran out. Terminal; needs operator attention.
    Failed,
}

impl TccPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TccPhase::Confirmed | TccPhase::Cancelled | TccPhase::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TccPhase::Trying => "Trying",
            TccPhase::Confirming => "Confirming",
            TccPhase::Confirmed => "Confirmed",
            TccPhase::Cancelling => "Cancelling",
            TccPhase::Cancelled => "Cancelled",
            TccPhase::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for TccPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One persisted TCC transaction.
///
/// The record outlives the process that started it: the stored params carry
/// everything cancel needs, so a recovery sweep can drive a stuck
/// transaction to Cancelled with nothing but this row. Normal flow never
/// hard-deletes a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TccTransaction {
    pub tx_id: TxId,
    /// Business type selecting the action implementation ("create_order",
    /// "process_payment", ...).
    pub tx_type: String,
    /// Business key the transaction is about (user id, payment no, ...).
    pub business_key: String,
    /// Action parameters, serialized so recovery can replay cancel.
    pub params: serde_json::Value,
    pub phase: TccPhase,
    /// Confirm/cancel attempts so far.
    pub retry_count: u32,
    pub max_retries: u32,
    /// Seconds after creation before a still-Trying record counts as stuck.
    pub timeout_secs: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TccTransaction {
    pub fn new(
        tx_type: impl Into<String>,
        business_key: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            tx_id: TxId::new(),
            tx_type: tx_type.into(),
            business_key: business_key.into(),
            params,
            phase: TccPhase::Trying,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_secs: DEFAULT_TX_TIMEOUT_SECS,
            created_at: now,
            updated_at: now,
        }
    }

    /// Instant at which a still-Trying record becomes eligible for the
    /// recovery sweep.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.created_at + chrono::Duration::seconds(i64::from(self.timeout_secs))
    }
}

/// Persistence seam for transaction records.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, tx: TccTransaction) -> Result<()>;

    async fn get(&self, tx_id: TxId) -> Result<TccTransaction>;

    async fn update(&self, tx: &TccTransaction) -> Result<()>;

    /// Transactions still in Trying whose own deadline has passed as of
    /// `now`. The recovery sweep cancels these.
    async fn stuck_in_trying(&self, now: DateTime<Utc>) -> Result<Vec<TccTransaction>>;
}

/// In-memory transaction store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransactionStore {
    state: Arc<Mutex<HashMap<TxId, TccTransaction>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, tx: TccTransaction) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.insert(tx.tx_id, tx);
        Ok(())
    }

    async fn get(&self, tx_id: TxId) -> Result<TccTransaction> {
        let state = self.state.lock().unwrap();
        state
            .get(&tx_id)
            .cloned()
            .ok_or(TccError::TransactionNotFound(tx_id))
    }

    async fn update(&self, tx: &TccTransaction) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.contains_key(&tx.tx_id) {
            return Err(TccError::TransactionNotFound(tx.tx_id));
        }
        state.insert(tx.tx_id, tx.clone());
        Ok(())
    }

    async fn stuck_in_trying(&self, now: DateTime<Utc>) -> Result<Vec<TccTransaction>> {
        let state = self.state.lock().unwrap();
        let mut stuck: Vec<TccTransaction> = state
            .values()
            .filter(|tx| tx.phase == TccPhase::Trying && tx.deadline() <= now)
            .cloned()
            .collect();
        stuck.sort_by_key(|tx| tx.created_at);
        Ok(stuck)
    }
}
