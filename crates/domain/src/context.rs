//! Per-invocation transition context and the append-only transition log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which entity family a transition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Order,
    Payment,
    Refund,
}

impl EntityKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Order => "Order",
            EntityKind::Payment => "Payment",
            EntityKind::Refund => "Refund",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ephemeral bookkeeping for one state machine invocation.
///
/// Built by a state service per call, converted into a
/// [`TransitionLogEntry`] once the transition persists, then discarded.
#[derive(Debug, Clone)]
pub struct StateContext<S, E> {
    /// The triggering event.
    pub event: E,
    /// Status before the transition.
    pub old_status: S,
    /// Status after the transition, filled in once the engine decides.
    pub new_status: Option<S>,
    /// Who triggered the transition ("system", an admin name, ...).
    pub operator: String,
    /// Free-text reason.
    pub reason: Option<String>,
    /// Transaction id reported by the external payment provider, if any.
    pub provider_txn_id: Option<String>,
}

impl<S, E> StateContext<S, E> {
    /// Creates a context for a pending transition.
    pub fn new(old_status: S, event: E, operator: impl Into<String>) -> Self {
        Self {
            event,
            old_status,
            new_status: None,
            operator: operator.into(),
            reason: None,
            provider_txn_id: None,
        }
    }

    /// Attaches a free-text reason.
    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    /// Attaches the provider transaction id.
    pub fn with_provider_txn_id(mut self, txn_id: Option<String>) -> Self {
        self.provider_txn_id = txn_id;
        self
    }
}

/// One row of the append-only transition log.
///
/// Log entries are written synchronously with the status update and are
/// never modified or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionLogEntry {
    /// Entity family.
    pub entity: EntityKind,
    /// Entity id within the family.
    pub entity_id: u64,
    /// Status before the transition.
    pub old_state: String,
    /// Status after the transition.
    pub new_state: String,
    /// The triggering event.
    pub event: String,
    /// Who triggered the transition.
    pub operator: String,
    /// Free-text reason.
    pub reason: Option<String>,
    /// Provider transaction id, when the event carried one.
    pub provider_txn_id: Option<String>,
    /// When the transition persisted.
    pub at: DateTime<Utc>,
}

impl TransitionLogEntry {
    /// Builds a log entry from a finished context.
    ///
    /// `new_status` must have been filled in by the engine.
    pub fn from_context<S, E>(
        entity: EntityKind,
        entity_id: u64,
        ctx: &StateContext<S, E>,
        new_status: &S,
    ) -> Self
    where
        S: std::fmt::Display,
        E: std::fmt::Display,
    {
        Self {
            entity,
            entity_id,
            old_state: ctx.old_status.to_string(),
            new_state: new_status.to_string(),
            event: ctx.event.to_string(),
            operator: ctx.operator.clone(),
            reason: ctx.reason.clone(),
            provider_txn_id: ctx.provider_txn_id.clone(),
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderEvent, OrderStatus};

    #[test]
    fn log_entry_from_context() {
        let ctx = StateContext::new(OrderStatus::PendingPayment, OrderEvent::Paid, "system")
            .with_reason(Some("callback".to_string()));
        let entry =
            TransitionLogEntry::from_context(EntityKind::Order, 7, &ctx, &OrderStatus::PendingShipment);

        assert_eq!(entry.entity, EntityKind::Order);
        assert_eq!(entry.entity_id, 7);
        assert_eq!(entry.old_state, "PendingPayment");
        assert_eq!(entry.new_state, "PendingShipment");
        assert_eq!(entry.event, "Paid");
        assert_eq!(entry.operator, "system");
        assert_eq!(entry.reason.as_deref(), Some("callback"));
    }
}
