//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Defines a `u64`-backed identifier newtype with the usual conversions.
macro_rules! numeric_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates an identifier from a raw value.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id! {
    /// Identifies a user account.
    UserId
}
numeric_id! {
    /// Identifies a shipping address.
    AddressId
}
numeric_id! {
    /// Identifies an order row.
    OrderId
}
numeric_id! {
    /// Identifies a payment row.
    PaymentId
}
numeric_id! {
    /// Identifies a refund request row.
    RefundId
}
numeric_id! {
    /// Identifies a cart line.
    CartLineId
}
numeric_id! {
    /// Identifies a coupon held by a user.
    CouponId
}
numeric_id! {
    /// Identifies a limited-participation campaign.
    ActivityId
}

/// Stock-keeping-unit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkuId(String);

impl SkuId {
    /// Creates a SKU identifier from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the SKU as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SkuId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SkuId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SkuId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SkuId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque identifier for one TCC transaction (saga instance).
///
/// Wraps a UUID so transaction ids are never confused with business
/// identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(Uuid);

impl TxId {
    /// Creates a new random transaction id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a transaction id from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TxId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TxId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<TxId> for Uuid {
    fn from(id: TxId) -> Self {
        id.0
    }
}
