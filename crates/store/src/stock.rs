//! Atomic stock reservation counters.
//!
//! One logical counter per SKU plus one membership set per
//! (activity, user) pair for limited campaigns. Balance check, duplicate
//! check, decrement, and membership record happen in a single atomic step,
//! so "sold out", "already reserved", and "reserved" are mutually
//! exclusive, race-free outcomes, never simulated with read-then-write.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{ActivityId, SkuId, UserId};

use crate::error::{Result, StoreError};

/// One-time-participation key for limited campaigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    /// The campaign.
    pub activity_id: ActivityId,
    /// The participating user.
    pub user_id: UserId,
}

/// Outcome of a reservation attempt. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Counter decremented (and membership recorded).
    Reserved,
    /// Insufficient balance; nothing changed.
    SoldOut,
    /// The user already holds a reservation under this campaign; nothing
    /// changed.
    AlreadyReserved,
}

impl ReserveOutcome {
    /// Returns true if the reservation was taken.
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReserveOutcome::Reserved)
    }
}

/// Atomic counter space for provisional stock holds.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Initializes (or resets) the counter for `sku` from the
    /// authoritative stock value.
    async fn provision(&self, sku: &SkuId, quantity: u32) -> Result<()>;

    /// Attempts to reserve `quantity` units in one atomic step.
    ///
    /// With a `dedup` key, the (activity, user) membership is checked and
    /// recorded in the same step. Errors with
    /// [`StoreError::Unprovisioned`] when the counter does not exist.
    async fn reserve(
        &self,
        sku: &SkuId,
        quantity: u32,
        dedup: Option<&DedupKey>,
    ) -> Result<ReserveOutcome>;

    /// Reverses a reservation: restores the counter and clears the
    /// membership mark. Used only on TCC Cancel.
    async fn release(&self, sku: &SkuId, quantity: u32, dedup: Option<&DedupKey>) -> Result<()>;

    /// Returns the current counter value, or `None` when unprovisioned.
    async fn level(&self, sku: &SkuId) -> Result<Option<u32>>;

    /// Returns a point-in-time copy of every counter.
    async fn snapshot(&self) -> Result<Vec<(SkuId, u32)>>;
}

#[derive(Debug, Default)]
struct StockState {
    counters: HashMap<SkuId, u32>,
    members: HashSet<DedupKey>,
}

/// In-memory counter space. The whole state sits behind one mutex so each
/// trait call is a single atomic operation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockStore {
    state: Arc<Mutex<StockState>>,
}

impl InMemoryStockStore {
    /// Creates an empty counter space.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the (activity, user) pair holds a membership mark.
    pub fn is_member(&self, dedup: &DedupKey) -> bool {
        self.state.lock().unwrap().members.contains(dedup)
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn provision(&self, sku: &SkuId, quantity: u32) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.counters.insert(sku.clone(), quantity);
        Ok(())
    }

    async fn reserve(
        &self,
        sku: &SkuId,
        quantity: u32,
        dedup: Option<&DedupKey>,
    ) -> Result<ReserveOutcome> {
        let mut state = self.state.lock().unwrap();

        let balance = *state
            .counters
            .get(sku)
            .ok_or_else(|| StoreError::Unprovisioned(sku.clone()))?;

        if let Some(key) = dedup {
            if state.members.contains(key) {
                return Ok(ReserveOutcome::AlreadyReserved);
            }
        }

        if balance < quantity {
            return Ok(ReserveOutcome::SoldOut);
        }

        state.counters.insert(sku.clone(), balance - quantity);
        if let Some(key) = dedup {
            state.members.insert(*key);
        }
        Ok(ReserveOutcome::Reserved)
    }

    async fn release(&self, sku: &SkuId, quantity: u32, dedup: Option<&DedupKey>) -> Result<()> {
        let mut state = self.state.lock().unwrap();

        let balance = *state
            .counters
            .get(sku)
            .ok_or_else(|| StoreError::Unprovisioned(sku.clone()))?;
        state.counters.insert(sku.clone(), balance + quantity);

        if let Some(key) = dedup {
            state.members.remove(key);
        }
        Ok(())
    }

    async fn level(&self, sku: &SkuId) -> Result<Option<u32>> {
        let state = self.state.lock().unwrap();
        Ok(state.counters.get(sku).copied())
    }

    async fn snapshot(&self) -> Result<Vec<(SkuId, u32)>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .counters
            .iter()
            .map(|(sku, qty)| (sku.clone(), *qty))
            .collect())
    }
}
