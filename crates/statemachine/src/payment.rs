//! The payment state machine table.

use domain::{Payment, PaymentEvent, PaymentStatus};

use crate::engine::StateMachine;

/// Builds the payment transition table.
pub fn payment_machine() -> StateMachine<PaymentStatus, PaymentEvent, Payment> {
    StateMachine::builder("payment")
        .transition(
            PaymentStatus::Pending,
            PaymentEvent::Process,
            PaymentStatus::Processing,
        )
        .transition(
            PaymentStatus::Pending,
            PaymentEvent::Close,
            PaymentStatus::Closed,
        )
        .transition(
            PaymentStatus::Pending,
            PaymentEvent::Timeout,
            PaymentStatus::Closed,
        )
        .transition(
            PaymentStatus::Processing,
            PaymentEvent::Success,
            PaymentStatus::Success,
        )
        .transition(
            PaymentStatus::Processing,
            PaymentEvent::Fail,
            PaymentStatus::Failed,
        )
        .transition(
            PaymentStatus::Processing,
            PaymentEvent::Close,
            PaymentStatus::Closed,
        )
        .transition(
            PaymentStatus::Processing,
            PaymentEvent::Timeout,
            PaymentStatus::Closed,
        )
        .transition(
            PaymentStatus::Success,
            PaymentEvent::RefundRequest,
            PaymentStatus::Refunding,
        )
        .transition(
            PaymentStatus::Refunding,
            PaymentEvent::RefundSuccess,
            PaymentStatus::Refunded,
        )
        .transition(
            PaymentStatus::Refunding,
            PaymentEvent::RefundFail,
            PaymentStatus::Failed,
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderId, UserId};

    fn dummy_payment() -> Payment {
        Payment::new(
            "PAY-1",
            OrderId::new(1),
            UserId::new(1),
            Money::from_cents(100),
        )
    }

    #[test]
    fn pending_through_success() {
        let m = payment_machine();
        let p = dummy_payment();
        let s = m
            .fire(PaymentStatus::Pending, PaymentEvent::Process, &p)
            .unwrap();
        assert_eq!(s, PaymentStatus::Processing);
        assert_eq!(
            m.fire(s, PaymentEvent::Success, &p).unwrap(),
            PaymentStatus::Success
        );
    }

    #[test]
    fn success_cannot_be_closed() {
        let m = payment_machine();
        let p = dummy_payment();
        assert!(m.fire(PaymentStatus::Success, PaymentEvent::Close, &p).is_err());
    }

    #[test]
    fn refund_leg() {
        let m = payment_machine();
        let p = dummy_payment();
        let s = m
            .fire(PaymentStatus::Success, PaymentEvent::RefundRequest, &p)
            .unwrap();
        assert_eq!(s, PaymentStatus::Refunding);
        assert_eq!(
            m.fire(s, PaymentEvent::RefundSuccess, &p).unwrap(),
            PaymentStatus::Refunded
        );
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let m = payment_machine();
        assert!(m.next_states(PaymentStatus::Failed).is_empty());
        assert!(m.next_states(PaymentStatus::Closed).is_empty());
        assert!(m.next_states(PaymentStatus::Refunded).is_empty());
    }
}
