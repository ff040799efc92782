//! Order repository with optimistic-versioned updates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, TxId, UserId};
use domain::Order;

use crate::error::{Result, StoreError};

/// Persistence seam for orders.
///
/// Every update goes through a compare-and-increment on the order's
/// `version`; a stale writer gets [`StoreError::VersionConflict`] and must
/// re-read and retry.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a new order, assigning its id. Returns the stored row.
    async fn insert(&self, order: Order) -> Result<Order>;

    /// Looks up an order by id.
    async fn get(&self, id: OrderId) -> Result<Option<Order>>;

    /// Looks up the provisional order created by a TCC transaction.
    async fn find_by_tx(&self, tx_id: TxId) -> Result<Option<Order>>;

    /// Writes `order` back if its version still matches the stored row,
    /// incrementing the version. Returns the stored row.
    async fn update(&self, order: &Order) -> Result<Order>;

    /// Deletes an order and its lines. Returns `true` if a row existed.
    async fn delete(&self, id: OrderId) -> Result<bool>;

    /// Lists a user's orders, excluding TCC-provisional rows.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;
}

#[derive(Debug, Default)]
struct OrderState {
    rows: HashMap<u64, Order>,
    next_id: u64,
}

/// In-memory order repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    state: Arc<Mutex<OrderState>>,
}

impl InMemoryOrderRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders, provisional rows included.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().rows.len()
    }

    /// Returns true if no orders are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert(&self, mut order: Order) -> Result<Order> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        order.id = OrderId::new(id);
        state.rows.insert(id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.lock().unwrap();
        Ok(state.rows.get(&id.value()).cloned())
    }

    async fn find_by_tx(&self, tx_id: TxId) -> Result<Option<Order>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .rows
            .values()
            .find(|o| o.tcc_tx_id == Some(tx_id))
            .cloned())
    }

    async fn update(&self, order: &Order) -> Result<Order> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .rows
            .get_mut(&order.id.value())
            .ok_or_else(|| StoreError::NotFound {
                entity: "order",
                id: order.id.to_string(),
            })?;

        if stored.version != order.version {
            return Err(StoreError::VersionConflict {
                entity: "order",
                id: order.id.to_string(),
                expected: order.version,
                actual: stored.version,
            });
        }

        let mut updated = order.clone();
        updated.version += 1;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, id: OrderId) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        Ok(state.rows.remove(&id.value()).is_some())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.lock().unwrap();
        let mut orders: Vec<Order> = state
            .rows
            .values()
            .filter(|o| o.user_id == user_id && o.status.is_customer_visible())
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.id);
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;
    use domain::OrderStatus;

    fn order(user: u64, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(0),
            order_no: "ORD-1".to_string(),
            user_id: UserId::new(user),
            status,
            total_amount: Money::from_cents(100),
            discount_amount: Money::zero(),
            shipping_fee: Money::zero(),
            payment_amount: Money::from_cents(100),
            coupon_id: None,
            points_used: 0,
            payment_method: "card".to_string(),
            remark: None,
            receiver_name: String::new(),
            receiver_phone: String::new(),
            receiver_address: String::new(),
            tcc_tx_id: None,
            lines: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
            paid_at: None,
            shipped_at: None,
            completed_at: None,
            cancelled_at: None,
            cancel_reason: None,
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_ids() {
        let repo = InMemoryOrderRepository::new();
        let a = repo.insert(order(1, OrderStatus::PendingPayment)).await.unwrap();
        let b = repo.insert(order(1, OrderStatus::PendingPayment)).await.unwrap();
        assert_eq!(a.id, OrderId::new(1));
        assert_eq!(b.id, OrderId::new(2));
    }

    #[tokio::test]
    async fn update_bumps_version_and_rejects_stale_writers() {
        let repo = InMemoryOrderRepository::new();
        let stored = repo.insert(order(1, OrderStatus::PendingPayment)).await.unwrap();

        // Two writers read the same version.
        let mut first = stored.clone();
        first.status = OrderStatus::PendingShipment;
        let mut second = stored.clone();
        second.status = OrderStatus::Cancelled;

        let won = repo.update(&first).await.unwrap();
        assert_eq!(won.version, 1);

        let err = repo.update(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));

        // Stored state is the winner's.
        let current = repo.get(stored.id).await.unwrap().unwrap();
        assert_eq!(current.status, OrderStatus::PendingShipment);
    }

    #[tokio::test]
    async fn provisional_orders_are_hidden_from_listings() {
        let repo = InMemoryOrderRepository::new();
        repo.insert(order(1, OrderStatus::PendingConfirmation))
            .await
            .unwrap();
        repo.insert(order(1, OrderStatus::PendingPayment)).await.unwrap();

        let visible = repo.list_for_user(UserId::new(1)).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn find_by_tx_locates_provisional_order() {
        let repo = InMemoryOrderRepository::new();
        let tx_id = TxId::new();
        let mut o = order(1, OrderStatus::PendingConfirmation);
        o.tcc_tx_id = Some(tx_id);
        let stored = repo.insert(o).await.unwrap();

        let found = repo.find_by_tx(tx_id).await.unwrap().unwrap();
        assert_eq!(found.id, stored.id);
        assert!(repo.find_by_tx(TxId::new()).await.unwrap().is_none());
    }
}
