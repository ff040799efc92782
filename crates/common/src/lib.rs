//! Shared types for the checkout core.
//!
//! Identifier newtypes prevent mixing up the many integer and UUID keys
//! that flow through the checkout pipeline, and [`Money`] keeps all
//! monetary arithmetic in integer cents.

pub mod ids;
pub mod money;

pub use ids::{
    ActivityId, AddressId, CartLineId, CouponId, OrderId, PaymentId, RefundId, SkuId, TxId, UserId,
};
pub use money::Money;
