//! Try-Confirm-Cancel transaction coordination.
//!
//! A [`TccManager`] drives [`TccAction`] implementations through Try,
//! Confirm, and Cancel, persisting the phase at every step so a crashed
//! process leaves a record a recovery sweep can finish. The checkout saga
//! and the payment sagas are the two action families; [`CheckoutService`]
//! is the end-to-end driver callers use to place an order.

pub mod action;
pub mod checkout;
pub mod error;
pub mod manager;
pub mod payment_action;
pub mod service;
pub mod transaction;

pub use action::TccAction;
pub use checkout::{CheckoutAction, CheckoutParams, TryOutcome, generate_order_no};
pub use error::{Result, TccError};
pub use manager::TccManager;
pub use payment_action::{PaymentAction, PaymentIntent, PaymentParams};
pub use service::{CheckoutReceipt, CheckoutRequest, CheckoutService};
pub use transaction::{
    DEFAULT_MAX_RETRIES, DEFAULT_TX_TIMEOUT_SECS, InMemoryTransactionStore, TccPhase,
    TccTransaction, TransactionStore,
};
