//! Payment repository with optimistic-versioned updates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use common::PaymentId;
use domain::Payment;

use crate::error::{Result, StoreError};

/// Persistence seam for payments. Same version discipline as orders.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts a new payment, assigning its id. Errors with
    /// [`StoreError::Duplicate`] when the payment number is taken.
    async fn insert(&self, payment: Payment) -> Result<Payment>;

    /// Looks up a payment by id.
    async fn get(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// Looks up a payment by its unique payment number.
    async fn get_by_no(&self, payment_no: &str) -> Result<Option<Payment>>;

    /// Writes `payment` back if its version still matches, incrementing
    /// the version. Returns the stored row.
    async fn update(&self, payment: &Payment) -> Result<Payment>;

    /// Deletes a payment. Returns `true` if a row existed.
    async fn delete(&self, id: PaymentId) -> Result<bool>;
}

#[derive(Debug, Default)]
struct PaymentState {
    rows: HashMap<u64, Payment>,
    next_id: u64,
}

/// In-memory payment repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentRepository {
    state: Arc<Mutex<PaymentState>>,
}

impl InMemoryPaymentRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored payments.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    /// Returns true if no payments are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PaymentRepository for InMemoryPaymentRepository {
    async fn insert(&self, mut payment: Payment) -> Result<Payment> {
        let mut state = self.state.lock().unwrap();
        if state
            .rows
            .values()
            .any(|p| p.payment_no == payment.payment_no)
        {
            return Err(StoreError::Duplicate {
                entity: "payment",
                id: payment.payment_no.clone(),
            });
        }

        state.next_id += 1;
        let id = state.next_id;
        payment.id = PaymentId::new(id);
        state.rows.insert(id, payment.clone());
        Ok(payment)
    }

    async fn get(&self, id: PaymentId) -> Result<Option<Payment>> {
        let state = self.state.lock().unwrap();
        Ok(state.rows.get(&id.value()).cloned())
    }

    async fn get_by_no(&self, payment_no: &str) -> Result<Option<Payment>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rows
            .values()
            .find(|p| p.payment_no == payment_no)
            .cloned())
    }

    async fn update(&self, payment: &Payment) -> Result<Payment> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .rows
            .get_mut(&payment.id.value())
            .ok_or_else(|| StoreError::NotFound {
                entity: "payment",
                id: payment.id.to_string(),
            })?;

        if stored.version != payment.version {
            return Err(StoreError::VersionConflict {
                entity: "payment",
                id: payment.id.to_string(),
                expected: payment.version,
                actual: stored.version,
            });
        }

        let mut updated = payment.clone();
        updated.version += 1;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: PaymentId) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(state.rows.remove(&id.value()).is_some())
    }
}
