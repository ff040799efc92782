//! Domain model for the checkout core.
//!
//! Orders, payments, and refunds each carry a status enum whose transitions
//! are owned by the state services in the `lifecycle` crate; nothing else
//! mutates a status field. Entities carry an explicit optimistic-lock
//! `version` counter that the repositories compare-and-increment on every
//! update.

pub mod context;
pub mod order;
pub mod payment;
pub mod refund;
pub mod shopping;

pub use context::{EntityKind, StateContext, TransitionLogEntry};
pub use order::{Order, OrderEvent, OrderLine, OrderStatus};
pub use payment::{Payment, PaymentEvent, PaymentStatus};
pub use refund::{Refund, RefundEvent, RefundStatus};
pub use shopping::{Address, CartLine, Coupon, CouponState, Product, User};
