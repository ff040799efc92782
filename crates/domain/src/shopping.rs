//! Supporting retail records consumed at checkout: users, addresses,
//! products, cart lines, and coupons.

use chrono::{DateTime, Utc};
use common::{AddressId, CartLineId, CouponId, Money, OrderId, SkuId, UserId};
use serde::{Deserialize, Serialize};

/// A user account, with the loyalty points balance checkout can spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Loyalty points balance. 1 point is worth 1 cent at checkout.
    pub points: u32,
}

/// A shipping address owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub receiver: String,
    pub phone: String,
    pub detail: String,
}

/// A sellable product, with the catalog's authoritative stock count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sku_id: SkuId,
    pub name: String,
    pub price: Money,
    /// Off-sale products cannot be checked out.
    pub on_sale: bool,
    /// Authoritative stock, decremented durably on TCC Confirm.
    pub stock: u32,
}

/// One line in a user's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub user_id: UserId,
    pub sku_id: SkuId,
    pub quantity: u32,
    /// Only selected lines participate in checkout when no explicit line
    /// ids are passed.
    pub selected: bool,
}

/// Redemption state of a user-held coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouponState {
    Unused,
    Used,
    Expired,
}

/// A coupon held by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub user_id: UserId,
    /// Face value deducted from the order total.
    pub value: Money,
    pub state: CouponState,
    /// Order that consumed the coupon, once used.
    pub used_by_order: Option<OrderId>,
    pub used_at: Option<DateTime<Utc>>,
}

impl Coupon {
    /// Returns true if this coupon can be applied by the given user.
    pub fn usable_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id && self.state == CouponState::Unused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coupon_usable_only_by_owner_when_unused() {
        let coupon = Coupon {
            id: CouponId::new(1),
            user_id: UserId::new(42),
            value: Money::from_cents(500),
            state: CouponState::Unused,
            used_by_order: None,
            used_at: None,
        };
        assert!(coupon.usable_by(UserId::new(42)));
        assert!(!coupon.usable_by(UserId::new(43)));

        let used = Coupon {
            state: CouponState::Used,
            ..coupon
        };
        assert!(!used.usable_by(UserId::new(42)));
    }
}
