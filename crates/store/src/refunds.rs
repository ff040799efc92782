//! Refund repository with optimistic-versioned updates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, RefundId};
use domain::Refund;

use crate::error::{Result, StoreError};

/// Persistence seam for refund requests. Same version discipline as
/// orders.
#[async_trait]
pub trait RefundRepository: Send + Sync {
    /// Inserts a new refund request, assigning its id.
    async fn insert(&self, refund: Refund) -> Result<Refund>;

    /// Looks up a refund by id.
    async fn get(&self, id: RefundId) -> Result<Option<Refund>>;

    /// Lists refunds opened against an order.
    async fn list_for_order(&self, order_id: OrderId) -> Result<Vec<Refund>>;

    /// Writes `refund` back if its version still matches, incrementing the
    /// version. Returns the stored row.
    async fn update(&self, refund: &Refund) -> Result<Refund>;
}

#[derive(Debug, Default)]
struct RefundState {
    rows: HashMap<u64, Refund>,
    next_id: u64,
}

/// In-memory refund repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRefundRepository {
    state: Arc<Mutex<RefundState>>,
}

impl InMemoryRefundRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefundRepository for InMemoryRefundRepository {
    async fn insert(&self, mut refund: Refund) -> Result<Refund> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        refund.id = RefundId::new(id);
        state.rows.insert(id, refund.clone());
        Ok(refund)
    }

    async fn get(&self, id: RefundId) -> Result<Option<Refund>> {
        let state = self.state.lock().unwrap();
        Ok(state.rows.get(&id.value()).cloned())
    }

    async fn list_for_order(&self, order_id: OrderId) -> Result<Vec<Refund>> {
        let state = self.state.lock().unwrap();
        let mut refunds: Vec<Refund> = state
            .rows
            .values()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect();
        refunds.sort_by_key(|r| r.id);
        Ok(refunds)
    }

    async fn update(&self, refund: &Refund) -> Result<Refund> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .rows
            .get_mut(&refund.id.value())
            .ok_or_else(|| StoreError::NotFound {
                entity: "refund",
                id: refund.id.to_string(),
            })?;

        if stored.version != refund.version {
            return Err(StoreError::VersionConflict {
                entity: "refund",
                id: refund.id.to_string(),
                expected: refund.version,
                actual: stored.version,
            });
        }

        let mut updated = refund.clone();
        updated.version += 1;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }
}
