//! The order checkout saga.
//!
//! Try acquires the per-user checkout lock, validates the user and address,
//! reserves stock for every cart line, and persists a provisional order in
//! PendingConfirmation. Confirm makes the stock decrement durable, promotes
//! the order to PendingPayment, and consumes the cart, coupon, and points.
//! Cancel releases every reservation and deletes the provisional order.
//!
//! Each phase takes and releases its own lock instance; the lock is never
//! held across the gap between phases.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{AddressId, CartLineId, CouponId, Money, OrderId, SkuId, UserId};
use domain::{Order, OrderEvent, OrderLine, OrderStatus};
use serde::{Deserialize, Serialize};
use store::{
    CartStore, CatalogStore, CouponStore, DistributedLock, OrderRepository, ReserveOutcome,
    StockStore, UserStore,
};
use uuid::Uuid;

use crate::action::TccAction;
use crate::error::{Result, TccError};
use crate::transaction::TccTransaction;

/// TTL on the per-user checkout lock.
const CHECKOUT_LOCK_TTL: Duration = Duration::from_secs(30);

/// Checkout parameters, persisted with the transaction record.
///
/// `order_id` and the resolved `cart_line_ids` are filled in after Try so
/// a recovery cancel can locate everything from the record alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutParams {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub remark: Option<String>,
    pub payment_method: String,
    pub coupon_id: Option<CouponId>,
    /// Explicit cart lines to buy; `None` means every selected line.
    pub cart_line_ids: Option<Vec<CartLineId>>,
    pub shipping_fee: Money,
    pub points_used: u32,
    /// Provisional order, known once Try has run.
    pub order_id: Option<OrderId>,
}

/// What a successful Try hands back to the driver.
#[derive(Debug, Clone)]
pub struct TryOutcome {
    pub order: Order,
    /// The cart lines the order consumed, resolved from the selection.
    pub line_ids: Vec<CartLineId>,
}

/// The checkout saga's three phases.
pub struct CheckoutAction {
    users: Arc<dyn UserStore>,
    cart: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogStore>,
    stock: Arc<dyn StockStore>,
    coupons: Arc<dyn CouponStore>,
    orders: Arc<dyn OrderRepository>,
    order_service: Arc<lifecycle::OrderStateService>,
    lock: Arc<dyn DistributedLock>,
}

impl CheckoutAction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserStore>,
        cart: Arc<dyn CartStore>,
        catalog: Arc<dyn CatalogStore>,
        stock: Arc<dyn StockStore>,
        coupons: Arc<dyn CouponStore>,
        orders: Arc<dyn OrderRepository>,
        order_service: Arc<lifecycle::OrderStateService>,
        lock: Arc<dyn DistributedLock>,
    ) -> Self {
        Self {
            users,
            cart,
            catalog,
            stock,
            coupons,
            orders,
            order_service,
            lock,
        }
    }

    fn user_lock_key(user_id: UserId) -> String {
        format!("order:tcc:lock:{user_id}")
    }

    async fn acquire_user_lock(&self, user_id: UserId) -> Result<(String, String)> {
        let key = Self::user_lock_key(user_id);
        let token = Uuid::new_v4().to_string();
        if !self.lock.try_lock(&key, &token, CHECKOUT_LOCK_TTL).await? {
            return Err(TccError::Busy(key));
        }
        Ok((key, token))
    }

    async fn release_user_lock(&self, key: &str, token: &str) {
        if let Err(err) = self.lock.release(key, token).await {
            tracing::warn!(%key, %err, "checkout lock release failed");
        }
    }

    /// Locates the provisional order by its recorded id, falling back to
    /// the transaction id for records written before Try finished.
    async fn provisional_order(
        &self,
        tx: &TccTransaction,
        params: &CheckoutParams,
    ) -> Result<Option<Order>> {
        if let Some(order_id) = params.order_id {
            return Ok(self.orders.get(order_id).await?);
        }
        Ok(self.orders.find_by_tx(tx.tx_id).await?)
    }

    async fn try_inner(&self, tx: &TccTransaction, params: &CheckoutParams) -> Result<TryOutcome> {
        let user = self
            .users
            .user(params.user_id)
            .await
            .map_err(|_| TccError::Validation(format!("user {} not found", params.user_id)))?;
        let address = self
            .users
            .address(params.address_id)
            .await
            .map_err(|_| TccError::Validation(format!("address {} not found", params.address_id)))?;
        if address.user_id != params.user_id {
            return Err(TccError::Validation(format!(
                "address {} does not belong to user {}",
                params.address_id, params.user_id
            )));
        }

        let lines = self
            .cart
            .checkout_lines(params.user_id, params.cart_line_ids.as_deref())
            .await?;
        if lines.is_empty() {
            return Err(TccError::Validation("no cart lines to check out".to_string()));
        }

        // Reserve stock per line. A failure partway releases everything
        // reserved so far before surfacing: Try is all-or-nothing from the
        // caller's perspective.
        let mut reserved: Vec<(SkuId, u32)> = Vec::new();
        let mut order_lines: Vec<OrderLine> = Vec::new();
        for line in &lines {
            let outcome = self.reserve_line(&line.sku_id, line.quantity).await;
            match outcome {
                Ok(order_line) => {
                    reserved.push((line.sku_id.clone(), line.quantity));
                    order_lines.push(order_line);
                }
                Err(err) => {
                    self.release_reserved(&reserved).await;
                    return Err(err);
                }
            }
        }

        let totals = match self.compute_totals(&user, params, &order_lines).await {
            Ok(totals) => totals,
            Err(err) => {
                self.release_reserved(&reserved).await;
                return Err(err);
            }
        };

        let now = Utc::now();
        let order = Order {
            id: OrderId::new(0),
            order_no: generate_order_no(),
            user_id: params.user_id,
            status: OrderStatus::PendingConfirmation,
            total_amount: totals.total,
            discount_amount: totals.discount,
            shipping_fee: params.shipping_fee,
            payment_amount: totals.payable,
            coupon_id: params.coupon_id,
            points_used: params.points_used,
            payment_method: params.payment_method.clone(),
            remark: params.remark.clone(),
            receiver_name: address.receiver,
            receiver_phone: address.phone,
            receiver_address: address.detail,
            tcc_tx_id: Some(tx.tx_id),
            lines: order_lines,
            version: 0,
            created_at: now,
            updated_at: now,
            paid_at: None,
            shipped_at: None,
            completed_at: None,
            cancelled_at: None,
            cancel_reason: None,
        };

        let stored = match self.orders.insert(order).await {
            Ok(stored) => stored,
            Err(err) => {
                self.release_reserved(&reserved).await;
                return Err(err.into());
            }
        };

        tracing::info!(
            order_id = %stored.id,
            order_no = %stored.order_no,
            user_id = %params.user_id,
            "provisional order created"
        );

        Ok(TryOutcome {
            line_ids: lines.iter().map(|l| l.id).collect(),
            order: stored,
        })
    }

    /// Checks the product is on sale and reserves one line's quantity.
    async fn reserve_line(&self, sku: &SkuId, quantity: u32) -> Result<OrderLine> {
        let product = self
            .catalog
            .product(sku)
            .await?
            .ok_or_else(|| TccError::Validation(format!("unknown product {sku}")))?;
        if !product.on_sale {
            return Err(TccError::Validation(format!("product {sku} is not on sale")));
        }

        match self.stock.reserve(sku, quantity, None).await? {
            ReserveOutcome::Reserved => Ok(OrderLine::new(
                sku.clone(),
                product.name,
                quantity,
                product.price,
            )),
            ReserveOutcome::SoldOut => {
                Err(TccError::Validation(format!("product {sku} is sold out")))
            }
            ReserveOutcome::AlreadyReserved => Err(TccError::Validation(format!(
                "already participated for {sku}"
            ))),
        }
    }

    async fn release_reserved(&self, reserved: &[(SkuId, u32)]) {
        for (sku, quantity) in reserved {
            if let Err(err) = self.stock.release(sku, *quantity, None).await {
                tracing::error!(%sku, quantity, %err, "reservation release failed");
            }
        }
    }

    async fn compute_totals(
        &self,
        user: &domain::User,
        params: &CheckoutParams,
        lines: &[OrderLine],
    ) -> Result<Totals> {
        let goods: Money = lines
            .iter()
            .fold(Money::zero(), |acc, line| acc + line.total());
        let total = goods + params.shipping_fee;

        let mut discount = Money::zero();
        if let Some(coupon_id) = params.coupon_id {
            let coupon = self
                .coupons
                .get(coupon_id)
                .await
                .map_err(|_| TccError::Validation(format!("coupon {coupon_id} not found")))?;
            if !coupon.usable_by(params.user_id) {
                return Err(TccError::Validation(format!("coupon {coupon_id} not usable")));
            }
            discount += coupon.value;
        }
        if params.points_used > 0 {
            if user.points < params.points_used {
                return Err(TccError::Validation(format!(
                    "insufficient points: have {}, want {}",
                    user.points, params.points_used
                )));
            }
            // 1 point is worth 1 cent.
            discount += Money::from_cents(i64::from(params.points_used));
        }

        let payable = total.saturating_sub(discount);
        Ok(Totals {
            total,
            discount,
            payable,
        })
    }

    async fn confirm_inner(&self, tx: &TccTransaction, params: &CheckoutParams) -> Result<()> {
        let Some(order) = self.provisional_order(tx, params).await? else {
            return Err(TccError::Validation(format!(
                "no provisional order for transaction {}",
                tx.tx_id
            )));
        };
        if order.status != OrderStatus::PendingConfirmation {
            // Already confirmed (or cancelled through another path).
            tracing::debug!(order_id = %order.id, status = %order.status, "confirm no-op");
            return Ok(());
        }

        // Durable stock decrement. Failing here leaves the transaction in
        // Trying; the reservation is not reversed until cancel runs.
        for line in &order.lines {
            let deducted = self.catalog.deduct_stock(&line.sku_id, line.quantity).await?;
            if !deducted {
                return Err(TccError::Validation(format!(
                    "catalog stock insufficient for {}",
                    line.sku_id
                )));
            }
        }

        self.order_service
            .fire(order.id, OrderEvent::Confirm, "tcc", None)
            .await?;

        if let Some(line_ids) = &params.cart_line_ids {
            self.cart.remove_lines(line_ids).await?;
        }
        if let Some(coupon_id) = params.coupon_id {
            self.coupons
                .mark_used(coupon_id, params.user_id, order.id)
                .await
                .map_err(|err| TccError::Conflict(err.to_string()))?;
        }
        if params.points_used > 0 {
            let deducted = self
                .users
                .deduct_points(params.user_id, params.points_used)
                .await?;
            if !deducted {
                return Err(TccError::Validation(format!(
                    "points balance changed under user {}",
                    params.user_id
                )));
            }
        }

        tracing::info!(order_id = %order.id, "checkout confirmed");
        Ok(())
    }

    async fn cancel_inner(&self, tx: &TccTransaction, params: &CheckoutParams) -> Result<()> {
        let Some(order) = self.provisional_order(tx, params).await? else {
            // Try never persisted an order; nothing to undo.
            tracing::debug!(tx_id = %tx.tx_id, "cancel no-op, no provisional order");
            return Ok(());
        };
        if order.status != OrderStatus::PendingConfirmation {
            tracing::debug!(order_id = %order.id, status = %order.status, "cancel no-op");
            return Ok(());
        }

        // Releases are best-effort; deleting the order afterwards makes a
        // retried cancel a no-op, so nothing is released twice.
        let reserved: Vec<(SkuId, u32)> = order
            .lines
            .iter()
            .map(|line| (line.sku_id.clone(), line.quantity))
            .collect();
        self.release_reserved(&reserved).await;
        self.orders.delete(order.id).await?;

        tracing::info!(order_id = %order.id, tx_id = %tx.tx_id, "checkout cancelled");
        Ok(())
    }
}

struct Totals {
    total: Money,
    discount: Money,
    payable: Money,
}

#[async_trait]
impl TccAction for CheckoutAction {
    type Params = CheckoutParams;
    type Output = TryOutcome;

    async fn try_action(&self, tx: &TccTransaction, params: &CheckoutParams) -> Result<TryOutcome> {
        let (key, token) = self.acquire_user_lock(params.user_id).await?;
        let result = self.try_inner(tx, params).await;
        self.release_user_lock(&key, &token).await;
        result
    }

    async fn confirm_action(&self, tx: &TccTransaction, params: &CheckoutParams) -> Result<()> {
        let (key, token) = self.acquire_user_lock(params.user_id).await?;
        let result = self.confirm_inner(tx, params).await;
        self.release_user_lock(&key, &token).await;
        result
    }

    /// Lock contention here is an error, not a silent return: the recovery
    /// sweep relies on cancel failing loudly so it can retry.
    async fn cancel_action(&self, tx: &TccTransaction, params: &CheckoutParams) -> Result<()> {
        let (key, token) = self.acquire_user_lock(params.user_id).await?;
        let result = self.cancel_inner(tx, params).await;
        self.release_user_lock(&key, &token).await;
        result
    }
}

/// Generates a human-facing order number: a prefix, a second-resolution
/// timestamp, and a random suffix for uniqueness within the second.
pub fn generate_order_no() -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix = &Uuid::new_v4().simple().to_string()[..6];
    format!("ORD{timestamp}{suffix}")
}
