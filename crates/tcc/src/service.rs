//! The checkout driver: begin → try → confirm, cancel on Try failure.

use std::sync::Arc;

use common::{AddressId, CartLineId, CouponId, Money, OrderId, UserId};
use domain::OrderStatus;

use crate::checkout::{CheckoutAction, CheckoutParams};
use crate::error::{Result, TccError};
use crate::manager::TccManager;

/// What a checkout caller submits.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub remark: Option<String>,
    pub payment_method: String,
    pub coupon_id: Option<CouponId>,
    /// Explicit cart lines to buy; `None` means every selected line.
    pub cart_line_ids: Option<Vec<CartLineId>>,
    pub shipping_fee: Money,
    pub points_used: u32,
}

/// What a successful checkout returns.
#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub order_no: String,
    pub total_amount: Money,
    pub payment_amount: Money,
    pub status: OrderStatus,
}

/// Drives the checkout saga end to end.
pub struct CheckoutService {
    manager: Arc<TccManager>,
    action: Arc<CheckoutAction>,
}

impl CheckoutService {
    pub fn new(manager: Arc<TccManager>, action: Arc<CheckoutAction>) -> Self {
        Self { manager, action }
    }

    /// Places an order under TCC.
    ///
    /// A Try failure cancels the transaction before the error surfaces; a
    /// cancel that itself fails is logged and left for the recovery sweep.
    /// A Confirm failure surfaces without cancelling: the record stays in
    /// Trying, and recovery (or an operator) decides its fate.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_order(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        metrics::counter!("checkout_executions_total").increment(1);
        let started = std::time::Instant::now();

        let mut params = CheckoutParams {
            user_id: request.user_id,
            address_id: request.address_id,
            remark: request.remark,
            payment_method: request.payment_method,
            coupon_id: request.coupon_id,
            cart_line_ids: request.cart_line_ids,
            shipping_fee: request.shipping_fee,
            points_used: request.points_used,
            order_id: None,
        };

        let tx = self
            .manager
            .begin("create_order", &request.user_id.to_string(), &params)
            .await?;

        let outcome = match self.manager.try_action(&*self.action, tx.tx_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                metrics::counter!("checkout_failed").increment(1);
                self.cancel_after_failure(tx.tx_id, &err).await;
                return Err(err);
            }
        };

        // Persist the provisional ids so a recovery cancel can find them.
        params.order_id = Some(outcome.order.id);
        params.cart_line_ids = Some(outcome.line_ids.clone());
        self.manager.update_params(tx.tx_id, &params).await?;

        if let Err(err) = self.manager.confirm_action(&*self.action, tx.tx_id).await {
            metrics::counter!("checkout_failed").increment(1);
            tracing::warn!(tx_id = %tx.tx_id, %err, "confirm failed, transaction left for recovery");
            return Err(err);
        }

        let duration = started.elapsed().as_secs_f64();
        metrics::histogram!("checkout_duration_seconds").record(duration);
        metrics::counter!("checkout_completed").increment(1);
        tracing::info!(
            tx_id = %tx.tx_id,
            order_id = %outcome.order.id,
            order_no = %outcome.order.order_no,
            duration,
            "checkout completed"
        );

        Ok(CheckoutReceipt {
            order_id: outcome.order.id,
            order_no: outcome.order.order_no,
            total_amount: outcome.order.total_amount,
            payment_amount: outcome.order.payment_amount,
            status: OrderStatus::PendingPayment,
        })
    }

    async fn cancel_after_failure(&self, tx_id: common::TxId, cause: &TccError) {
        tracing::warn!(%tx_id, %cause, "try failed, cancelling");
        if let Err(err) = self.manager.cancel_action(&*self.action, tx_id).await {
            // The record stays in Trying; the sweep retries the cancel.
            tracing::error!(%tx_id, %err, "cancel failed, left for recovery sweep");
        }
    }
}
