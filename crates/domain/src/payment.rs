//! Payment entity and its status/event vocabulary.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, UserId};
use serde::{Deserialize, Serialize};

/// The status of a payment in its lifecycle.
///
/// Status transitions (driven by [`PaymentEvent`]):
/// ```text
/// Pending ──Process──► Processing ──Success──► Success ──RefundRequest──► Refunding
///    │                     │    │                                            │
///    │ Close/Timeout       │    │ Fail                          RefundSuccess│ RefundFail
///    ▼                     ▼    ▼                                            ▼
///  Closed ◄────────────────┘  Failed ◄───────────────────────────────────────┤
///                                                                    Refunded┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Created, not yet handed to the provider.
    Pending,
    /// Submitted to the payment provider.
    Processing,
    /// Provider confirmed the charge.
    Success,
    /// Provider rejected the charge, or a refund failed (terminal state).
    Failed,
    /// Closed before completion (terminal state).
    Closed,
    /// A refund is in flight against this payment.
    Refunding,
    /// Refunded in full (terminal state).
    Refunded,
}

impl PaymentStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Closed | PaymentStatus::Refunded
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Processing => "Processing",
            PaymentStatus::Success => "Success",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Closed => "Closed",
            PaymentStatus::Refunding => "Refunding",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events that drive payment status transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentEvent {
    /// Hand the payment to the provider.
    Process,
    /// Provider notified success.
    Success,
    /// Provider deadline passed.
    Timeout,
    /// Close an unfinished payment.
    Close,
    /// Provider notified failure.
    Fail,
    /// A refund was requested against a successful payment.
    RefundRequest,
    /// The provider confirmed the refund.
    RefundSuccess,
    /// The provider rejected the refund.
    RefundFail,
}

impl PaymentEvent {
    /// Returns the event name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEvent::Process => "Process",
            PaymentEvent::Success => "Success",
            PaymentEvent::Timeout => "Timeout",
            PaymentEvent::Close => "Close",
            PaymentEvent::Fail => "Fail",
            PaymentEvent::RefundRequest => "RefundRequest",
            PaymentEvent::RefundSuccess => "RefundSuccess",
            PaymentEvent::RefundFail => "RefundFail",
        }
    }
}

impl std::fmt::Display for PaymentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Payment id, assigned by the repository on insert.
    pub id: PaymentId,
    /// Human-facing payment number, unique per payment.
    pub payment_no: String,
    /// The order being paid for.
    pub order_id: OrderId,
    /// The paying user.
    pub user_id: UserId,
    /// Amount to charge.
    pub amount: Money,
    /// Current lifecycle status.
    pub status: PaymentStatus,
    /// Transaction id assigned by the external payment provider.
    pub provider_txn_id: Option<String>,
    /// Optimistic-lock counter, compared-and-incremented on every update.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// When the provider confirmed the charge.
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Creates a new pending payment.
    pub fn new(
        payment_no: impl Into<String>,
        order_id: OrderId,
        user_id: UserId,
        amount: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(0),
            payment_no: payment_no.into(),
            order_id,
            user_id,
            amount,
            status: PaymentStatus::Pending,
            provider_txn_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
            paid_at: None,
        }
    }
}
