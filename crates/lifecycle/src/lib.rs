//! State services for orders, payments, and refunds.
//!
//! A state service is the single mutation path for its entity's status. It
//! binds the transition engine to persistence: load, fire, apply side
//! effects, write behind the optimistic version check, append a transition
//! log entry, publish a best-effort change notification. Refund transitions
//! additionally cascade into the order lifecycle.

pub mod error;
pub mod notify;
pub mod order_service;
pub mod payment_service;
pub mod refund_service;

pub use error::{LifecycleError, Result};
pub use notify::{ChangePublisher, StateChanged};
pub use order_service::OrderStateService;
pub use payment_service::PaymentStateService;
pub use refund_service::RefundStateService;
