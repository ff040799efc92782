//! Order entity and its status/event vocabulary.

use chrono::{DateTime, Utc};
use common::{CouponId, Money, OrderId, SkuId, TxId, UserId};
use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Status transitions (driven by [`OrderEvent`]):
/// ```text
/// PendingConfirmation ──Confirm──► PendingPayment ──Paid──► PendingShipment ──Ship──► Shipped
///                                        │                        │                     │
///                                        │ Cancel/Timeout         │ Cancel              │ Receive
///                                        ▼                        ▼                     ▼
///                                    Cancelled                Cancelled             Completed
///
/// PendingShipment/Shipped/Completed ──RefundApply──► Refunding ──RefundComplete──► Refunded
///                                                        └────────RefundFail──► Completed
/// ```
///
/// `PendingConfirmation` is internal to the TCC Try phase: orders in that
/// status are provisional and must never receive customer-facing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Provisional order created by a TCC Try phase.
    PendingConfirmation,
    /// Awaiting payment.
    PendingPayment,
    /// Paid, awaiting shipment.
    PendingShipment,
    /// Shipped, awaiting receipt.
    Shipped,
    /// Received by the customer (terminal unless refunded).
    Completed,
    /// Cancelled (terminal state).
    Cancelled,
    /// A refund request is open against this order.
    Refunding,
    /// Refund completed (terminal state).
    Refunded,
}

impl OrderStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Returns true if this status is ever shown to customers.
    ///
    /// `PendingConfirmation` orders are TCC-internal and are filtered out of
    /// normal listings.
    pub fn is_customer_visible(&self) -> bool {
        !matches!(self, OrderStatus::PendingConfirmation)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingConfirmation => "PendingConfirmation",
            OrderStatus::PendingPayment => "PendingPayment",
            OrderStatus::PendingShipment => "PendingShipment",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Refunding => "Refunding",
            OrderStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events that drive order status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderEvent {
    /// TCC Confirm phase promotes a provisional order. Internal only.
    Confirm,
    /// Payment received.
    Paid,
    /// Shipment dispatched.
    Ship,
    /// Customer confirmed receipt.
    Receive,
    /// Cancelled by the customer or an operator.
    Cancel,
    /// Payment deadline passed; cancelled by the system.
    Timeout,
    /// A refund request was submitted.
    RefundApply,
    /// The refund finished successfully.
    RefundComplete,
    /// The refund was rejected or failed.
    RefundFail,
}

impl OrderEvent {
    /// Returns the event name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEvent::Confirm => "Confirm",
            OrderEvent::Paid => "Paid",
            OrderEvent::Ship => "Ship",
            OrderEvent::Receive => "Receive",
            OrderEvent::Cancel => "Cancel",
            OrderEvent::Timeout => "Timeout",
            OrderEvent::RefundApply => "RefundApply",
            OrderEvent::RefundComplete => "RefundComplete",
            OrderEvent::RefundFail => "RefundFail",
        }
    }
}

impl std::fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of an order: a SKU and the quantity purchased at a unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// The SKU purchased.
    pub sku_id: SkuId,
    /// Product name at time of purchase.
    pub product_name: String,
    /// Quantity purchased.
    pub quantity: u32,
    /// Price per unit.
    pub unit_price: Money,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(
        sku_id: impl Into<SkuId>,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            sku_id: sku_id.into(),
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the line total (quantity × unit price).
    pub fn total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An order row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order id, assigned by the repository on insert.
    pub id: OrderId,
    /// Human-facing order number.
    pub order_no: String,
    /// The ordering user.
    pub user_id: UserId,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Sum of line totals plus shipping fee.
    pub total_amount: Money,
    /// Coupon plus points discount applied.
    pub discount_amount: Money,
    /// Shipping fee charged.
    pub shipping_fee: Money,
    /// Amount actually payable (total minus discounts, floored at zero).
    pub payment_amount: Money,
    /// Coupon consumed by this order, if any.
    pub coupon_id: Option<CouponId>,
    /// Loyalty points spent on this order.
    pub points_used: u32,
    /// Payment method chosen at checkout.
    pub payment_method: String,
    /// Free-text customer remark.
    pub remark: Option<String>,
    /// Receiver name copied from the shipping address.
    pub receiver_name: String,
    /// Receiver phone copied from the shipping address.
    pub receiver_phone: String,
    /// Full shipping address.
    pub receiver_address: String,
    /// The TCC transaction that created this order, while provisional.
    pub tcc_tx_id: Option<TxId>,
    /// Order lines.
    pub lines: Vec<OrderLine>,
    /// Optimistic-lock counter, compared-and-incremented on every update.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// When payment was received.
    pub paid_at: Option<DateTime<Utc>>,
    /// When the shipment was dispatched.
    pub shipped_at: Option<DateTime<Utc>>,
    /// When the customer confirmed receipt.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the order was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why the order was cancelled.
    pub cancel_reason: Option<String>,
}

impl Order {
    /// Returns the sum of line totals, excluding shipping.
    pub fn lines_total(&self) -> Money {
        self.lines
            .iter()
            .fold(Money::zero(), |acc, line| acc + line.total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::PendingPayment.is_terminal());
        assert!(!OrderStatus::Refunding.is_terminal());
    }

    #[test]
    fn pending_confirmation_is_hidden() {
        assert!(!OrderStatus::PendingConfirmation.is_customer_visible());
        assert!(OrderStatus::PendingPayment.is_customer_visible());
    }

    #[test]
    fn line_total() {
        let line = OrderLine::new("SKU-001", "Widget", 3, Money::from_cents(250));
        assert_eq!(line.total(), Money::from_cents(750));
    }

    #[test]
    fn status_serialization_roundtrip() {
        let status = OrderStatus::Refunding;
        let json = serde_json::to_string(&status).unwrap();
        let back: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, status);
    }
}
