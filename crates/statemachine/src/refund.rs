//! The refund state machine table.

use common::Money;
use domain::{RefundEvent, RefundStatus};

use crate::engine::StateMachine;

/// Guard input for refund transitions: the requested amount checked against
/// what the payment actually collected.
#[derive(Debug, Clone, Copy)]
pub struct RefundContext {
    /// Amount the refund requests.
    pub amount: Money,
    /// Amount the referenced payment collected.
    pub paid_amount: Money,
}

fn amount_within_paid(ctx: &RefundContext) -> Result<(), String> {
    if ctx.amount > ctx.paid_amount {
        Err(format!(
            "refund amount {} exceeds paid amount {}",
            ctx.amount, ctx.paid_amount
        ))
    } else {
        Ok(())
    }
}

/// Builds the refund transition table.
///
/// `Submit` in `Pending` is a legal self-loop: submission doubles as an
/// idempotent bootstrap for callers that race the record's creation.
pub fn refund_machine() -> StateMachine<RefundStatus, RefundEvent, RefundContext> {
    StateMachine::builder("refund")
        .guarded(
            RefundStatus::Pending,
            RefundEvent::Submit,
            RefundStatus::Pending,
            amount_within_paid,
        )
        .guarded(
            RefundStatus::Pending,
            RefundEvent::Approve,
            RefundStatus::Approved,
            amount_within_paid,
        )
        .transition(
            RefundStatus::Pending,
            RefundEvent::Reject,
            RefundStatus::Rejected,
        )
        .transition(
            RefundStatus::Pending,
            RefundEvent::Cancel,
            RefundStatus::Rejected,
        )
        .transition(
            RefundStatus::Approved,
            RefundEvent::Process,
            RefundStatus::Processing,
        )
        .transition(
            RefundStatus::Processing,
            RefundEvent::Complete,
            RefundStatus::Completed,
        )
        .transition(
            RefundStatus::Processing,
            RefundEvent::Fail,
            RefundStatus::Failed,
        )
        .build()
}
