//! Infrastructure seams for the checkout core.
//!
//! Each concern is an async trait with an in-memory implementation:
//! the distributed lock, the atomic stock reservation counters, the
//! authoritative catalog, the entity repositories (all updates go through
//! an optimistic version check), cart/coupon/user stores, and the
//! append-only transition log.
//!
//! The in-memory implementations hold their whole state behind a single
//! mutex so that every trait operation is one atomic step, the same
//! guarantee a production backend provides with a script or a guarded
//! UPDATE.

pub mod cart;
pub mod catalog;
pub mod coupons;
pub mod error;
pub mod lock;
pub mod orders;
pub mod payments;
pub mod refunds;
pub mod stock;
pub mod txlog;
pub mod users;

pub use cart::{CartStore, InMemoryCartStore};
pub use catalog::{CatalogStore, InMemoryCatalog, sync_counters_to_catalog};
pub use coupons::{CouponStore, InMemoryCouponStore};
pub use error::{Result, StoreError};
pub use lock::{DistributedLock, InMemoryLock};
pub use orders::{InMemoryOrderRepository, OrderRepository};
pub use payments::{InMemoryPaymentRepository, PaymentRepository};
pub use refunds::{InMemoryRefundRepository, RefundRepository};
pub use stock::{DedupKey, InMemoryStockStore, ReserveOutcome, StockStore};
pub use txlog::{InMemoryTransitionLog, TransitionLogStore};
pub use users::{InMemoryUserStore, UserStore};
