//! Order state service.

use std::sync::Arc;

use chrono::Utc;
use common::OrderId;
use domain::{EntityKind, Order, OrderEvent, OrderStatus, StateContext, TransitionLogEntry};
use statemachine::{StateMachine, order_machine};
use store::{OrderRepository, TransitionLogStore};

use crate::error::{LifecycleError, Result};
use crate::notify::{ChangePublisher, StateChanged};

/// The only mutation path for order status.
///
/// Each call loads the order, asks the machine for the next state, applies
/// the event's side effects, persists behind the optimistic version check,
/// appends one transition log entry, and publishes a best-effort change
/// notification.
pub struct OrderStateService {
    orders: Arc<dyn OrderRepository>,
    log: Arc<dyn TransitionLogStore>,
    machine: StateMachine<OrderStatus, OrderEvent, Order>,
    publisher: ChangePublisher,
}

impl OrderStateService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        log: Arc<dyn TransitionLogStore>,
        publisher: ChangePublisher,
    ) -> Self {
        Self {
            orders,
            log,
            machine: order_machine(),
            publisher,
        }
    }

    /// Fires one event against an order and persists the result.
    ///
    /// Returns the stored order after the transition. A version conflict
    /// surfaces as a retryable [`LifecycleError::Conflict`].
    #[tracing::instrument(skip(self), fields(%order_id, ?event))]
    pub async fn fire(
        &self,
        order_id: OrderId,
        event: OrderEvent,
        operator: &str,
        reason: Option<String>,
    ) -> Result<Order> {
        let mut order = self
            .orders
            .get(order_id)
            .await?
            .ok_or(LifecycleError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })?;

        let ctx = StateContext::new(order.status, event, operator).with_reason(reason.clone());
        let next = self
            .machine
            .fire(order.status, event, &order)
            .map_err(|e| LifecycleError::Transition(e.to_string()))?;

        let now = Utc::now();
        match event {
            OrderEvent::Paid => order.paid_at = Some(now),
            OrderEvent::Ship => order.shipped_at = Some(now),
            OrderEvent::Receive => order.completed_at = Some(now),
            OrderEvent::Cancel | OrderEvent::Timeout => {
                order.cancelled_at = Some(now);
                order.cancel_reason = reason;
            }
            _ => {}
        }
        let old = order.status;
        order.status = next;
        order.updated_at = now;

        let stored = self.orders.update(&order).await?;
        self.log
            .append(TransitionLogEntry::from_context(
                EntityKind::Order,
                order_id.value(),
                &ctx,
                &next,
            ))
            .await?;

        self.publisher.publish(StateChanged {
            entity: EntityKind::Order,
            entity_id: order_id.value(),
            old_state: old.to_string(),
            new_state: next.to_string(),
            event: event.to_string(),
            at: now,
        });

        metrics::counter!("state_transitions_total", "entity" => "order").increment(1);
        tracing::info!(%order_id, old = %old, new = %next, "order transition applied");

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, TxId, UserId};
    use domain::OrderLine;
    use store::{InMemoryOrderRepository, InMemoryTransitionLog};

    fn service() -> (OrderStateService, Arc<InMemoryOrderRepository>) {
        let orders = Arc::new(InMemoryOrderRepository::new());
        let log = Arc::new(InMemoryTransitionLog::new());
        let service =
            OrderStateService::new(orders.clone(), log, ChangePublisher::new());
        (service, orders)
    }

    fn pending_payment_order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(0),
            order_no: "ORD-TEST".to_string(),
            user_id: UserId::new(1),
            status: OrderStatus::PendingPayment,
            total_amount: Money::from_cents(2000),
            discount_amount: Money::zero(),
            shipping_fee: Money::zero(),
            payment_amount: Money::from_cents(2000),
            coupon_id: None,
            points_used: 0,
            payment_method: "card".to_string(),
            remark: None,
            receiver_name: "alice".to_string(),
            receiver_phone: "555-0100".to_string(),
            receiver_address: "1 Main St".to_string(),
            tcc_tx_id: Some(TxId::new()),
            lines: vec![OrderLine::new("SKU-A", "Widget", 2, Money::from_cents(1000))],
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
    async fn paid_event_sets_paid_at() {
        let (service, orders) = service();
        let order = orders.insert(pending_payment_order()).await.unwrap();

        let updated = service
            .fire(order.id, OrderEvent::Paid, "system", None)
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::PendingShipment);
        assert!(updated.paid_at.is_some());
    }

    #[tokio::test]
    async fn cancel_records_reason_and_timestamp() {
        let (service, orders) = service();
        let order = orders.insert(pending_payment_order()).await.unwrap();

        let updated = service
            .fire(
                order.id,
                OrderEvent::Cancel,
                "customer",
                Some("changed my mind".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Cancelled);
        assert!(updated.cancelled_at.is_some());
        assert_eq!(updated.cancel_reason.as_deref(), Some("changed my mind"));
    }

    #[tokio::test]
    async fn illegal_event_leaves_order_unchanged() {
        let (service, orders) = service();
        let order = orders.insert(pending_payment_order()).await.unwrap();

        let err = service
            .fire(order.id, OrderEvent::Ship, "system", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Transition(_)));

        let stored = orders.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::PendingPayment);
        assert_eq!(stored.version, order.version);
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let (service, _) = service();
        let err = service
            .fire(OrderId::new(404), OrderEvent::Paid, "system", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound { .. }));
    }
}
