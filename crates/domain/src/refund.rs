//! Refund entity and its status/event vocabulary.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, RefundId, UserId};
use serde::{Deserialize, Serialize};

/// The status of a refund request in its lifecycle.
///
/// Status transitions (driven by [`RefundEvent`]):
/// ```text
/// Pending ──Approve──► Approved ──Process──► Processing ──Complete──► Completed
///   │  │                                         │
///   │  └──Submit (self-loop, idempotent)         └──Fail──► Failed
///   │
///   └──Reject/Cancel──► Rejected
/// ```
///
/// `Submit` against an already-`Pending` refund is a legal self-loop: the
/// submitter may race the record's creation, so submission doubles as an
/// idempotent bootstrap rather than demanding a stricter precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefundStatus {
    /// Submitted, awaiting review.
    Pending,
    /// Approved by a reviewer, awaiting processing.
    Approved,
    /// Rejected or withdrawn (terminal state).
    Rejected,
    /// Money movement in flight at the provider.
    Processing,
    /// Refund paid out (terminal state).
    Completed,
    /// Provider failed the refund (terminal state).
    Failed,
}

impl RefundStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefundStatus::Rejected | RefundStatus::Completed | RefundStatus::Failed
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "Pending",
            RefundStatus::Approved => "Approved",
            RefundStatus::Rejected => "Rejected",
            RefundStatus::Processing => "Processing",
            RefundStatus::Completed => "Completed",
            RefundStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events that drive refund status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefundEvent {
    /// Customer submitted the request (idempotent bootstrap).
    Submit,
    /// Reviewer approved.
    Approve,
    /// Reviewer rejected.
    Reject,
    /// Money movement started at the provider.
    Process,
    /// Provider confirmed the payout.
    Complete,
    /// Provider failed the payout.
    Fail,
    /// Customer withdrew the request.
    Cancel,
}

impl RefundEvent {
    /// Returns the event name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundEvent::Submit => "Submit",
            RefundEvent::Approve => "Approve",
            RefundEvent::Reject => "Reject",
            RefundEvent::Process => "Process",
            RefundEvent::Complete => "Complete",
            RefundEvent::Fail => "Fail",
            RefundEvent::Cancel => "Cancel",
        }
    }
}

impl std::fmt::Display for RefundEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A refund request row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    /// Refund id, assigned by the repository on insert.
    pub id: RefundId,
    /// Human-facing refund number.
    pub refund_no: String,
    /// The order being refunded.
    pub order_id: OrderId,
    /// The payment being reversed.
    pub payment_id: PaymentId,
    /// The requesting user.
    pub user_id: UserId,
    /// Amount requested.
    pub amount: Money,
    /// Current lifecycle status.
    pub status: RefundStatus,
    /// Customer-supplied reason.
    pub reason: Option<String>,
    /// Reviewer who approved or rejected the request.
    pub reviewer: Option<String>,
    /// Optimistic-lock counter, compared-and-incremented on every update.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// When the payout finished.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Refund {
    /// Creates a new pending refund request.
    pub fn new(
        refund_no: impl Into<String>,
        order_id: OrderId,
        payment_id: PaymentId,
        user_id: UserId,
        amount: Money,
        reason: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RefundId::new(0),
            refund_no: refund_no.into(),
            order_id,
            payment_id,
            user_id,
            amount,
            status: RefundStatus::Pending,
            reason,
            reviewer: None,
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(RefundStatus::Rejected.is_terminal());
        assert!(RefundStatus::Completed.is_terminal());
        assert!(RefundStatus::Failed.is_terminal());
        assert!(!RefundStatus::Pending.is_terminal());
    }

    #[test]
    fn new_refund_starts_pending() {
        let r = Refund::new(
            "REF-1",
            OrderId::new(1),
            PaymentId::new(2),
            UserId::new(3),
            Money::from_cents(100),
            Some("damaged".to_string()),
        );
        assert_eq!(r.status, RefundStatus::Pending);
        assert!(r.reviewer.is_none());
    }
}
