//! The order state machine table.

use domain::{Order, OrderEvent, OrderStatus};

use crate::engine::StateMachine;

/// Builds the order transition table.
///
/// `PendingConfirmation` has exactly one exit, the TCC-internal `Confirm`
/// event; customer-facing call sites never fire it.
pub fn order_machine() -> StateMachine<OrderStatus, OrderEvent, Order> {
    StateMachine::builder("order")
        // TCC Confirm phase promotes the provisional order.
        .transition(
            OrderStatus::PendingConfirmation,
            OrderEvent::Confirm,
            OrderStatus::PendingPayment,
        )
        .transition(
            OrderStatus::PendingPayment,
            OrderEvent::Paid,
            OrderStatus::PendingShipment,
        )
        .transition(
            OrderStatus::PendingPayment,
            OrderEvent::Cancel,
            OrderStatus::Cancelled,
        )
        .transition(
            OrderStatus::PendingPayment,
            OrderEvent::Timeout,
            OrderStatus::Cancelled,
        )
        .transition(
            OrderStatus::PendingShipment,
            OrderEvent::Ship,
            OrderStatus::Shipped,
        )
        .transition(
            OrderStatus::PendingShipment,
            OrderEvent::Cancel,
            OrderStatus::Cancelled,
        )
        .transition(
            OrderStatus::PendingShipment,
            OrderEvent::RefundApply,
            OrderStatus::Refunding,
        )
        .transition(
            OrderStatus::Shipped,
            OrderEvent::Receive,
            OrderStatus::Completed,
        )
        .transition(
            OrderStatus::Shipped,
            OrderEvent::RefundApply,
            OrderStatus::Refunding,
        )
        .transition(
            OrderStatus::Completed,
            OrderEvent::RefundApply,
            OrderStatus::Refunding,
        )
        .transition(
            OrderStatus::Refunding,
            OrderEvent::RefundComplete,
            OrderStatus::Refunded,
        )
        .transition(
            OrderStatus::Refunding,
            OrderEvent::RefundFail,
            OrderStatus::Completed,
        )
        .build()
}
