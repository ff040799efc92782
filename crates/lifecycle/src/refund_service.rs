//! Refund state service, with its cascade into the order lifecycle.

use std::sync::Arc;

use chrono::Utc;
use common::RefundId;
use domain::{EntityKind, OrderEvent, RefundEvent, RefundStatus, StateContext, TransitionLogEntry};
use statemachine::{RefundContext, StateMachine, refund_machine};
use store::{PaymentRepository, RefundRepository, TransitionLogStore};

use crate::error::{LifecycleError, Result};
use crate::notify::{ChangePublisher, StateChanged};
use crate::order_service::OrderStateService;

/// The only mutation path for refund status.
///
/// Refund transitions cascade into the order lifecycle: a submitted refund
/// moves the order into Refunding, a completed one into Refunded, a failed
/// one back to Completed. Cascades are direct calls, and a cascade failure
/// is logged rather than propagated so the refund's own transition is never
/// rolled back by a downstream hiccup.
pub struct RefundStateService {
    refunds: Arc<dyn RefundRepository>,
    payments: Arc<dyn PaymentRepository>,
    log: Arc<dyn TransitionLogStore>,
    machine: StateMachine<RefundStatus, RefundEvent, RefundContext>,
    orders: Arc<OrderStateService>,
    publisher: ChangePublisher,
}

impl RefundStateService {
    pub fn new(
        refunds: Arc<dyn RefundRepository>,
        payments: Arc<dyn PaymentRepository>,
        log: Arc<dyn TransitionLogStore>,
        orders: Arc<OrderStateService>,
        publisher: ChangePublisher,
    ) -> Self {
        Self {
            refunds,
            payments,
            log,
            machine: refund_machine(),
            orders,
            publisher,
        }
    }

    /// Fires one event against a refund and persists the result.
    ///
    /// Submit against an already-Pending refund succeeds: the table carries
    /// a Pending self-loop so a caller racing the initial insert still gets
    /// a consistent answer.
    #[tracing::instrument(skip(self), fields(%refund_id, ?event))]
    pub async fn fire(
        &self,
        refund_id: RefundId,
        event: RefundEvent,
        operator: &str,
        reason: Option<String>,
    ) -> Result<domain::Refund> {
        let mut refund = self
            .refunds
            .get(refund_id)
            .await?
            .ok_or(LifecycleError::NotFound {
                entity: "refund",
                id: refund_id.to_string(),
            })?;

        // The amount guard compares the request against what was actually
        // paid, so the payment row is the source of truth.
        let payment =
            self.payments
                .get(refund.payment_id)
                .await?
                .ok_or(LifecycleError::NotFound {
                    entity: "payment",
                    id: refund.payment_id.to_string(),
                })?;
        let guard_ctx = RefundContext {
            amount: refund.amount,
            paid_amount: payment.amount,
        };

        let ctx = StateContext::new(refund.status, event, operator).with_reason(reason.clone());
        let next = self
            .machine
            .fire(refund.status, event, &guard_ctx)
            .map_err(|e| LifecycleError::Transition(e.to_string()))?;

        let now = Utc::now();
        match event {
            RefundEvent::Approve | RefundEvent::Reject => {
                refund.reviewer = Some(operator.to_string());
            }
            RefundEvent::Complete => refund.completed_at = Some(now),
            _ => {}
        }
        let old = refund.status;
        refund.status = next;
        refund.updated_at = now;

        let stored = self.refunds.update(&refund).await?;
        self.log
            .append(TransitionLogEntry::from_context(
                EntityKind::Refund,
                refund_id.value(),
                &ctx,
                &next,
            ))
            .await?;

        self.publisher.publish(StateChanged {
            entity: EntityKind::Refund,
            entity_id: refund_id.value(),
            old_state: old.to_string(),
            new_state: next.to_string(),
            event: event.to_string(),
            at: now,
        });

        metrics::counter!("state_transitions_total", "entity" => "refund").increment(1);
        tracing::info!(%refund_id, old = %old, new = %next, "refund transition applied");

        self.cascade(&stored, event).await;

        Ok(stored)
    }

    /// Propagates a refund transition into the order lifecycle.
    async fn cascade(&self, refund: &domain::Refund, event: RefundEvent) {
        let order_event = match event {
            RefundEvent::Submit => Some(OrderEvent::RefundApply),
            RefundEvent::Complete => Some(OrderEvent::RefundComplete),
            RefundEvent::Fail => Some(OrderEvent::RefundFail),
            _ => None,
        };
        let Some(order_event) = order_event else {
            return;
        };

        if let Err(err) = self
            .orders
            .fire(refund.order_id, order_event, "refund-service", None)
            .await
        {
            tracing::warn!(
                refund_id = %refund.id,
                order_id = %refund.order_id,
                ?order_event,
                %err,
                "refund cascade into order failed"
            );
        }
    }

    /// Submits a refund request for an order: inserts the row and fires
    /// Submit, which is the bootstrap self-loop on Pending and cascades
    /// the order into Refunding.
    #[tracing::instrument(skip(self, refund), fields(order_id = %refund.order_id))]
    pub async fn submit(&self, refund: domain::Refund) -> Result<domain::Refund> {
        let operator = refund.user_id.to_string();
        let reason = refund.reason.clone();
        let stored = self.refunds.insert(refund).await?;
        self.fire(stored.id, RefundEvent::Submit, &operator, reason)
            .await
    }
}
