//! Payment state service.

use std::sync::Arc;

use chrono::Utc;
use common::PaymentId;
use domain::{EntityKind, Payment, PaymentEvent, PaymentStatus, StateContext, TransitionLogEntry};
use statemachine::{StateMachine, payment_machine};
use store::{PaymentRepository, TransitionLogStore};

use crate::error::{LifecycleError, Result};
use crate::notify::{ChangePublisher, StateChanged};

/// The only mutation path for payment status.
pub struct PaymentStateService {
    payments: Arc<dyn PaymentRepository>,
    log: Arc<dyn TransitionLogStore>,
    machine: StateMachine<PaymentStatus, PaymentEvent, Payment>,
    publisher: ChangePublisher,
}

impl PaymentStateService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        log: Arc<dyn TransitionLogStore>,
        publisher: ChangePublisher,
    ) -> Self {
        Self {
            payments,
            log,
            machine: payment_machine(),
            publisher,
        }
    }

    /// Fires one event against a payment and persists the result.
    ///
    /// `provider_txn_id` is the external provider's transaction reference,
    /// carried by success callbacks and recorded on the payment row.
    #[tracing::instrument(skip(self), fields(%payment_id, ?event))]
    pub async fn fire(
        &self,
        payment_id: PaymentId,
        event: PaymentEvent,
        operator: &str,
        provider_txn_id: Option<String>,
    ) -> Result<Payment> {
        let mut payment = self
            .payments
            .get(payment_id)
            .await?
            .ok_or(LifecycleError::NotFound {
                entity: "payment",
                id: payment_id.to_string(),
            })?;

        let ctx = StateContext::new(payment.status, event, operator)
            .with_provider_txn_id(provider_txn_id.clone());
        let next = self
            .machine
            .fire(payment.status, event, &payment)
            .map_err(|e| LifecycleError::Transition(e.to_string()))?;

        let now = Utc::now();
        if event == PaymentEvent::Success {
            payment.paid_at = Some(now);
            payment.provider_txn_id = provider_txn_id;
        }
        let old = payment.status;
        payment.status = next;
        payment.updated_at = now;

        let stored = self.payments.update(&payment).await?;
        self.log
            .append(TransitionLogEntry::from_context(
                EntityKind::Payment,
                payment_id.value(),
                &ctx,
                &next,
            ))
            .await?;

        self.publisher.publish(StateChanged {
            entity: EntityKind::Payment,
            entity_id: payment_id.value(),
            old_state: old.to_string(),
            new_state: next.to_string(),
            event: event.to_string(),
            at: now,
        });

        metrics::counter!("state_transitions_total", "entity" => "payment").increment(1);
        tracing::info!(%payment_id, old = %old, new = %next, "payment transition applied");

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderId, UserId};
    use store::InMemoryPaymentRepository;

    fn service() -> (PaymentStateService, Arc<InMemoryPaymentRepository>) {
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let log = Arc::new(store::InMemoryTransitionLog::new());
        let service =
            PaymentStateService::new(payments.clone(), log, ChangePublisher::new());
        (service, payments)
    }

    async fn processing_payment(payments: &InMemoryPaymentRepository) -> Payment {
        let payment = Payment::new(
            "PAY-1",
            OrderId::new(1),
            UserId::new(1),
            Money::from_cents(2000),
        );
        let mut payment = payments.insert(payment).await.unwrap();
        payment.status = PaymentStatus::Processing;
        payments.update(&payment).await.unwrap()
    }

    #[tokio::test]
    async fn success_records_provider_txn_id_and_paid_at() {
        let (service, payments) = service();
        let payment = processing_payment(&payments).await;

        let updated = service
            .fire(
                payment.id,
                PaymentEvent::Success,
                "callback",
                Some("txn-abc".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(updated.status, PaymentStatus::Success);
        assert_eq!(updated.provider_txn_id.as_deref(), Some("txn-abc"));
        assert!(updated.paid_at.is_some());
    }

    #[tokio::test]
    async fn success_from_pending_is_illegal() {
        let (service, payments) = service();
        let payment = payments
            .insert(Payment::new(
                "PAY-2",
                OrderId::new(1),
                UserId::new(1),
                Money::from_cents(500),
            ))
            .await
            .unwrap();

        let err = service
            .fire(payment.id, PaymentEvent::Success, "callback", None)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Transition(_)));
    }
}
