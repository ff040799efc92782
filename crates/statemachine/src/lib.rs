//! Table-driven state machine engine.
//!
//! One generic engine executes a single transition against a finite
//! (state, event) → state relation, with optional guards that can veto a
//! structurally legal hop. The order, payment, and refund machines are three
//! instantiations of the same engine with their own tables.
//!
//! The engine checks the legality of one hop only; it does not enforce
//! reachability, and terminal states are simply states with no outgoing
//! entries.

pub mod engine;
pub mod order;
pub mod payment;
pub mod refund;

pub use engine::{StateMachine, StateMachineBuilder, TransitionError};
pub use order::order_machine;
pub use payment::payment_machine;
pub use refund::{RefundContext, refund_machine};
