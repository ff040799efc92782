//! Payment sagas: create, process, and close a payment under TCC.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{Money, OrderId, PaymentId, UserId};
use domain::{Payment, PaymentEvent, PaymentStatus};
use lifecycle::PaymentStateService;
use serde::{Deserialize, Serialize};
use store::PaymentRepository;

use crate::action::TccAction;
use crate::error::{Result, TccError};
use crate::transaction::TccTransaction;

/// Which payment operation this transaction performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentIntent {
    /// Insert a Pending payment row.
    Create,
    /// Drive Pending → Processing (Try) → Success (Confirm).
    Process,
    /// Close an unpaid payment.
    Close,
}

/// Payment saga parameters, persisted with the transaction record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentParams {
    pub intent: PaymentIntent,
    pub payment_no: String,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
    /// Known once Create's Try has run, or supplied for Process/Close.
    pub payment_id: Option<PaymentId>,
    /// Provider reference, carried by Process confirms.
    pub provider_txn_id: Option<String>,
    /// Status the payment held before Process's Try ran; cancel restores
    /// it. Process only fires from Pending, so unset means Pending.
    #[serde(default)]
    pub pre_try_status: Option<PaymentStatus>,
}

/// One action serves all three payment intents; the phases dispatch on the
/// intent stored in the parameters.
pub struct PaymentAction {
    payments: Arc<dyn PaymentRepository>,
    service: Arc<PaymentStateService>,
}

impl PaymentAction {
    pub fn new(payments: Arc<dyn PaymentRepository>, service: Arc<PaymentStateService>) -> Self {
        Self { payments, service }
    }

    async fn load(&self, params: &PaymentParams) -> Result<Payment> {
        if let Some(id) = params.payment_id {
            return self
                .payments
                .get(id)
                .await?
                .ok_or_else(|| TccError::Validation(format!("payment {id} not found")));
        }
        self.payments
            .get_by_no(&params.payment_no)
            .await?
            .ok_or_else(|| {
                TccError::Validation(format!("payment {} not found", params.payment_no))
            })
    }
}

#[async_trait]
impl TccAction for PaymentAction {
    type Params = PaymentParams;
    type Output = Payment;

    async fn try_action(&self, _tx: &TccTransaction, params: &PaymentParams) -> Result<Payment> {
        match params.intent {
            PaymentIntent::Create => {
                let payment = Payment::new(
                    params.payment_no.clone(),
                    params.order_id,
                    params.user_id,
                    params.amount,
                );
                let stored = self
                    .payments
                    .insert(payment)
                    .await
                    .map_err(|err| TccError::Conflict(err.to_string()))?;
                tracing::info!(payment_id = %stored.id, payment_no = %stored.payment_no, "payment created");
                Ok(stored)
            }
            PaymentIntent::Process => {
                let payment = self.load(params).await?;
                Ok(self
                    .service
                    .fire(payment.id, PaymentEvent::Process, "tcc", None)
                    .await?)
            }
            PaymentIntent::Close => {
                // Nothing provisional to create; Try just checks the row
                // exists and is still closable.
                let payment = self.load(params).await?;
                if payment.status.is_terminal() {
                    return Err(TccError::Validation(format!(
                        "payment {} is already {}",
                        payment.payment_no, payment.status
                    )));
                }
                Ok(payment)
            }
        }
    }

    async fn confirm_action(&self, _tx: &TccTransaction, params: &PaymentParams) -> Result<()> {
        match params.intent {
            // The Pending row is the durable outcome; nothing more to do.
            PaymentIntent::Create => Ok(()),
            PaymentIntent::Process => {
                let payment = self.load(params).await?;
                if payment.status == PaymentStatus::Success {
                    return Ok(());
                }
                self.service
                    .fire(
                        payment.id,
                        PaymentEvent::Success,
                        "tcc",
                        params.provider_txn_id.clone(),
                    )
                    .await?;
                Ok(())
            }
            PaymentIntent::Close => {
                let payment = self.load(params).await?;
                if payment.status == PaymentStatus::Closed {
                    return Ok(());
                }
                self.service
                    .fire(payment.id, PaymentEvent::Close, "tcc", None)
                    .await?;
                Ok(())
            }
        }
    }

    async fn cancel_action(&self, _tx: &TccTransaction, params: &PaymentParams) -> Result<()> {
        match params.intent {
            PaymentIntent::Create => {
                // Only a still-Pending row is provisional enough to delete.
                let Ok(payment) = self.load(params).await else {
                    return Ok(());
                };
                if payment.status == PaymentStatus::Pending {
                    self.payments.delete(payment.id).await?;
                    tracing::info!(payment_id = %payment.id, "provisional payment deleted");
                }
                Ok(())
            }
            PaymentIntent::Process => {
                let Ok(payment) = self.load(params).await else {
                    return Ok(());
                };
                // A succeeded payment is past the point of no return. An
                // attempt still in Processing goes back to its pre-Try
                // status so the payment stays retryable. The restore is a
                // direct write, not a machine transition.
                if payment.status == PaymentStatus::Processing {
                    let mut restored = payment;
                    restored.status = params.pre_try_status.unwrap_or(PaymentStatus::Pending);
                    restored.updated_at = Utc::now();
                    let restored = self.payments.update(&restored).await?;
                    tracing::info!(
                        payment_id = %restored.id,
                        status = %restored.status,
                        "processing attempt rolled back"
                    );
                }
                Ok(())
            }
            // Close's Try changed nothing.
            PaymentIntent::Close => Ok(()),
        }
    }
}
