//! Coupon storage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use common::{CouponId, OrderId, UserId};
use domain::{Coupon, CouponState};

use crate::error::{Result, StoreError};

/// Persistence seam for user-held coupons.
#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn get(&self, id: CouponId) -> Result<Coupon>;

    async fn put(&self, coupon: Coupon) -> Result<()>;

    /// Marks a coupon as consumed by an order. Fails with
    /// [`StoreError::Duplicate`] when the coupon is no longer unused, so a
    /// replayed confirm does not consume it twice.
    async fn mark_used(&self, id: CouponId, user_id: UserId, order_id: OrderId) -> Result<()>;
}

/// In-memory coupon store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCouponStore {
    state: Arc<Mutex<HashMap<u64, Coupon>>>,
}

impl InMemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn get(&self, id: CouponId) -> Result<Coupon> {
        let state = self.state.lock().unwrap();
        state.get(&id.value()).cloned().ok_or(StoreError::NotFound {
            entity: "coupon",
            id: id.to_string(),
        })
    }

    async fn put(&self, coupon: Coupon) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.insert(coupon.id.value(), coupon);
        Ok(())
    }

    async fn mark_used(&self, id: CouponId, user_id: UserId, order_id: OrderId) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let coupon = state.get_mut(&id.value()).ok_or(StoreError::NotFound {
            entity: "coupon",
            id: id.to_string(),
        })?;
        if !coupon.usable_by(user_id) {
            // Already used (possibly by this very order on a replay) or
            // held by another user.
            if coupon.used_by_order == Some(order_id) {
                return Ok(());
            }
            return Err(StoreError::Duplicate {
                entity: "coupon",
                id: id.to_string(),
            });
        }
        coupon.state = CouponState::Used;
        coupon.used_by_order = Some(order_id);
        coupon.used_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    fn coupon(id: u64, user: u64) -> Coupon {
        Coupon {
            id: CouponId::new(id),
            user_id: UserId::new(user),
            value: Money::from_cents(500),
            state: CouponState::Unused,
            used_by_order: None,
            used_at: None,
        }
    }

    #[tokio::test]
    async fn mark_used_consumes_once() {
        let store = InMemoryCouponStore::new();
        store.put(coupon(1, 7)).await.unwrap();

        store
            .mark_used(CouponId::new(1), UserId::new(7), OrderId::new(100))
            .await
            .unwrap();
        let stored = store.get(CouponId::new(1)).await.unwrap();
        assert_eq!(stored.state, CouponState::Used);
        assert_eq!(stored.used_by_order, Some(OrderId::new(100)));
    }

    #[tokio::test]
    async fn mark_used_is_idempotent_for_same_order() {
        let store = InMemoryCouponStore::new();
        store.put(coupon(1, 7)).await.unwrap();

        let id = CouponId::new(1);
        store
            .mark_used(id, UserId::new(7), OrderId::new(100))
            .await
            .unwrap();
        store
            .mark_used(id, UserId::new(7), OrderId::new(100))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mark_used_rejects_a_second_order() {
        let store = InMemoryCouponStore::new();
        store.put(coupon(1, 7)).await.unwrap();

        let id = CouponId::new(1);
        store
            .mark_used(id, UserId::new(7), OrderId::new(100))
            .await
            .unwrap();
        let err = store
            .mark_used(id, UserId::new(7), OrderId::new(101))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }
}
