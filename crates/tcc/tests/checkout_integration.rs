//! End-to-end checkout scenarios over the in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use common::{AddressId, CartLineId, CouponId, Money, OrderId, SkuId, UserId};
use domain::{Address, CartLine, Coupon, CouponState, Order, OrderLine, OrderStatus, Product, User};
use lifecycle::{ChangePublisher, OrderStateService};
use store::{
    CartStore, CatalogStore, CouponStore, DistributedLock, InMemoryCartStore, InMemoryCatalog,
    InMemoryCouponStore, InMemoryLock, InMemoryOrderRepository, InMemoryStockStore,
    InMemoryTransitionLog, InMemoryUserStore, OrderRepository, StockStore, UserStore,
};
use tcc::{
    CheckoutAction, CheckoutRequest, CheckoutService, InMemoryTransactionStore, TccError,
    TccManager, TccPhase,
};

struct Fixture {
    users: Arc<InMemoryUserStore>,
    cart: Arc<InMemoryCartStore>,
    catalog: Arc<InMemoryCatalog>,
    stock: Arc<InMemoryStockStore>,
    coupons: Arc<InMemoryCouponStore>,
    orders: Arc<InMemoryOrderRepository>,
    lock: Arc<InMemoryLock>,
    manager: Arc<TccManager>,
    action: Arc<CheckoutAction>,
    service: CheckoutService,
}

fn fixture() -> Fixture {
    let users = Arc::new(InMemoryUserStore::new());
    let cart = Arc::new(InMemoryCartStore::new());
    let catalog = Arc::new(InMemoryCatalog::new());
    let stock = Arc::new(InMemoryStockStore::new());
    let coupons = Arc::new(InMemoryCouponStore::new());
    let orders = Arc::new(InMemoryOrderRepository::new());
    let lock = Arc::new(InMemoryLock::new());
    let log = Arc::new(InMemoryTransitionLog::new());

    let order_service = Arc::new(OrderStateService::new(
        orders.clone(),
        log,
        ChangePublisher::new(),
    ));
    let action = Arc::new(CheckoutAction::new(
        users.clone(),
        cart.clone(),
        catalog.clone(),
        stock.clone(),
        coupons.clone(),
        orders.clone(),
        order_service,
        lock.clone(),
    ));
    let manager = Arc::new(TccManager::new(
        Arc::new(InMemoryTransactionStore::new()),
        lock.clone(),
    ));
    let service = CheckoutService::new(manager.clone(), action.clone());

    Fixture {
        users,
        cart,
        catalog,
        stock,
        coupons,
        orders,
        lock,
        manager,
        action,
        service,
    }
}

async fn seed_user(fx: &Fixture, user_id: u64, points: u32) {
    fx.users
        .put_user(User {
            id: UserId::new(user_id),
            name: format!("user-{user_id}"),
            points,
        })
        .await
        .unwrap();
    fx.users
        .put_address(Address {
            id: AddressId::new(user_id * 10),
            user_id: UserId::new(user_id),
            receiver: "alice".to_string(),
            phone: "555-0100".to_string(),
            detail: "1 Main St".to_string(),
        })
        .await
        .unwrap();
}

async fn seed_product(fx: &Fixture, sku: &str, price_cents: i64, stock: u32) {
    fx.catalog
        .put_product(Product {
            sku_id: SkuId::new(sku),
            name: format!("{sku} name"),
            price: Money::from_cents(price_cents),
            on_sale: true,
            stock,
        })
        .await
        .unwrap();
    fx.stock.provision(&SkuId::new(sku), stock).await.unwrap();
}

async fn seed_cart_line(fx: &Fixture, line_id: u64, user_id: u64, sku: &str, quantity: u32) {
    fx.cart
        .add_line(CartLine {
            id: CartLineId::new(line_id),
            user_id: UserId::new(user_id),
            sku_id: SkuId::new(sku),
            quantity,
            selected: true,
        })
        .await
        .unwrap();
}

fn request(user_id: u64) -> CheckoutRequest {
    CheckoutRequest {
        user_id: UserId::new(user_id),
        address_id: AddressId::new(user_id * 10),
        remark: None,
        payment_method: "card".to_string(),
        coupon_id: None,
        cart_line_ids: None,
        shipping_fee: Money::zero(),
        points_used: 0,
    }
}

#[tokio::test]
async fn checkout_happy_path() {
    let fx = fixture();
    seed_user(&fx, 1, 0).await;
    seed_product(&fx, "SKU-A", 1000, 5).await;
    seed_cart_line(&fx, 1, 1, "SKU-A", 2).await;

    let receipt = fx.service.create_order(request(1)).await.unwrap();

    assert_eq!(receipt.status, OrderStatus::PendingPayment);
    assert_eq!(receipt.total_amount, Money::from_cents(2000));
    assert_eq!(receipt.payment_amount, Money::from_cents(2000));
    assert!(receipt.order_no.starts_with("ORD"));

    // Reservation counter and durable stock both dropped by 2.
    assert_eq!(fx.stock.level(&SkuId::new("SKU-A")).await.unwrap(), Some(3));
    assert_eq!(fx.catalog.stock(&SkuId::new("SKU-A")).await.unwrap(), Some(3));

    // The cart line was consumed.
    let remaining = fx
        .cart
        .checkout_lines(UserId::new(1), None)
        .await
        .unwrap();
    assert!(remaining.is_empty());

    let order = fx.orders.get(receipt.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.lines.len(), 1);
}

#[tokio::test]
async fn checkout_applies_coupon_and_points_discounts() {
    let fx = fixture();
    seed_user(&fx, 1, 300).await;
    seed_product(&fx, "SKU-A", 1000, 5).await;
    seed_cart_line(&fx, 1, 1, "SKU-A", 2).await;
    fx.coupons
        .put(Coupon {
            id: CouponId::new(7),
            user_id: UserId::new(1),
            value: Money::from_cents(500),
            state: CouponState::Unused,
            used_by_order: None,
            used_at: None,
        })
        .await
        .unwrap();

    let mut req = request(1);
    req.coupon_id = Some(CouponId::new(7));
    req.points_used = 300;
    req.shipping_fee = Money::from_cents(100);

    let receipt = fx.service.create_order(req).await.unwrap();

    // 2000 goods + 100 shipping - 500 coupon - 300 points.
    assert_eq!(receipt.total_amount, Money::from_cents(2100));
    assert_eq!(receipt.payment_amount, Money::from_cents(1300));

    let coupon = fx.coupons.get(CouponId::new(7)).await.unwrap();
    assert_eq!(coupon.state, CouponState::Used);
    assert_eq!(coupon.used_by_order, Some(receipt.order_id));

    let user = fx.users.user(UserId::new(1)).await.unwrap();
    assert_eq!(user.points, 0);
}

#[tokio::test]
async fn sold_out_midway_releases_earlier_reservations() {
    let fx = fixture();
    seed_user(&fx, 1, 0).await;
    seed_product(&fx, "SKU-A", 1000, 5).await;
    seed_product(&fx, "SKU-B", 2000, 1).await;
    seed_cart_line(&fx, 1, 1, "SKU-A", 2).await;
    seed_cart_line(&fx, 2, 1, "SKU-B", 3).await;

    let err = fx.service.create_order(request(1)).await.unwrap_err();
    assert!(matches!(err, TccError::Validation(_)));

    // SKU-A's partial reservation was released; nothing was persisted.
    assert_eq!(fx.stock.level(&SkuId::new("SKU-A")).await.unwrap(), Some(5));
    assert_eq!(fx.stock.level(&SkuId::new("SKU-B")).await.unwrap(), Some(1));
    assert!(fx.orders.is_empty());
}

#[tokio::test]
async fn failed_confirm_leaves_transaction_for_manual_cancel() {
    let fx = fixture();
    seed_user(&fx, 1, 0).await;
    seed_product(&fx, "SKU-A", 1000, 5).await;
    seed_cart_line(&fx, 1, 1, "SKU-A", 2).await;

    let mut params = tcc::CheckoutParams {
        user_id: UserId::new(1),
        address_id: AddressId::new(10),
        remark: None,
        payment_method: "card".to_string(),
        coupon_id: None,
        cart_line_ids: None,
        shipping_fee: Money::zero(),
        points_used: 0,
        order_id: None,
    };
    let tx = fx
        .manager
        .begin("create_order", "1", &params)
        .await
        .unwrap();
    let outcome = fx.manager.try_action(&*fx.action, tx.tx_id).await.unwrap();
    params.order_id = Some(outcome.order.id);
    params.cart_line_ids = Some(outcome.line_ids.clone());
    fx.manager.update_params(tx.tx_id, &params).await.unwrap();

    assert_eq!(fx.stock.level(&SkuId::new("SKU-A")).await.unwrap(), Some(3));

    // The catalog was independently corrected downward between phases, so
    // the durable decrement cannot cover the reservation.
    fx.catalog
        .set_stock(&SkuId::new("SKU-A"), 1)
        .await
        .unwrap();

    let err = fx
        .manager
        .confirm_action(&*fx.action, tx.tx_id)
        .await
        .unwrap_err();
    assert!(matches!(err, TccError::Validation(_)));
    assert_eq!(fx.manager.get(tx.tx_id).await.unwrap().phase, TccPhase::Trying);

    // While stuck, the provisional order is hidden from listings.
    let visible = fx.orders.list_for_user(UserId::new(1)).await.unwrap();
    assert!(visible.is_empty());

    // A manual (or sweep-driven) cancel restores everything.
    fx.manager
        .cancel_action(&*fx.action, tx.tx_id)
        .await
        .unwrap();
    assert_eq!(fx.manager.get(tx.tx_id).await.unwrap().phase, TccPhase::Cancelled);
    assert_eq!(fx.stock.level(&SkuId::new("SKU-A")).await.unwrap(), Some(5));
    assert!(fx.orders.get(outcome.order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn cancel_survives_a_failed_release_and_never_releases_twice() {
    let fx = fixture();
    seed_user(&fx, 1, 0).await;
    seed_product(&fx, "SKU-A", 1000, 5).await;

    // Two units held for this order. SKU-B has no reservation counter, so
    // releasing it fails.
    fx.stock
        .reserve(&SkuId::new("SKU-A"), 2, None)
        .await
        .unwrap();

    let mut params = tcc::CheckoutParams {
        user_id: UserId::new(1),
        address_id: AddressId::new(10),
        remark: None,
        payment_method: "card".to_string(),
        coupon_id: None,
        cart_line_ids: None,
        shipping_fee: Money::zero(),
        points_used: 0,
        order_id: None,
    };
    let tx = fx
        .manager
        .begin("create_order", "1", &params)
        .await
        .unwrap();

    let now = chrono::Utc::now();
    let order = fx
        .orders
        .insert(Order {
            id: OrderId::new(0),
            order_no: "ORD20260830000000abc123".to_string(),
            user_id: UserId::new(1),
            status: OrderStatus::PendingConfirmation,
            total_amount: Money::from_cents(4000),
            discount_amount: Money::zero(),
            shipping_fee: Money::zero(),
            payment_amount: Money::from_cents(4000),
            coupon_id: None,
            points_used: 0,
            payment_method: "card".to_string(),
            remark: None,
            receiver_name: "alice".to_string(),
            receiver_phone: "555-0100".to_string(),
            receiver_address: "1 Main St".to_string(),
            tcc_tx_id: Some(tx.tx_id),
            lines: vec![
                OrderLine::new(SkuId::new("SKU-B"), "SKU-B name", 1, Money::from_cents(2000)),
                OrderLine::new(SkuId::new("SKU-A"), "SKU-A name", 2, Money::from_cents(1000)),
            ],
            version: 0,
            created_at: now,
            updated_at: now,
            paid_at: None,
            shipped_at: None,
            completed_at: None,
            cancelled_at: None,
            cancel_reason: None,
        })
        .await
        .unwrap();
    params.order_id = Some(order.id);
    fx.manager.update_params(tx.tx_id, &params).await.unwrap();

    // The failed SKU-B release does not block the rest of the cancel.
    fx.manager
        .cancel_action(&*fx.action, tx.tx_id)
        .await
        .unwrap();
    assert_eq!(
        fx.manager.get(tx.tx_id).await.unwrap().phase,
        TccPhase::Cancelled
    );
    assert_eq!(fx.stock.level(&SkuId::new("SKU-A")).await.unwrap(), Some(5));
    assert!(fx.orders.get(order.id).await.unwrap().is_none());

    // A replayed cancel is a no-op; the counter does not inflate.
    fx.manager
        .cancel_action(&*fx.action, tx.tx_id)
        .await
        .unwrap();
    assert_eq!(fx.stock.level(&SkuId::new("SKU-A")).await.unwrap(), Some(5));
}

#[tokio::test]
async fn contended_user_lock_means_busy() {
    let fx = fixture();
    seed_user(&fx, 1, 0).await;
    seed_product(&fx, "SKU-A", 1000, 5).await;
    seed_cart_line(&fx, 1, 1, "SKU-A", 1).await;

    // Another checkout for the same user holds the lock.
    assert!(
        fx.lock
            .try_lock("order:tcc:lock:1", "other", Duration::from_secs(30))
            .await
            .unwrap()
    );

    let err = fx.service.create_order(request(1)).await.unwrap_err();
    assert!(matches!(err, TccError::Busy(_)));

    // Nothing was reserved or persisted.
    assert_eq!(fx.stock.level(&SkuId::new("SKU-A")).await.unwrap(), Some(5));
    assert!(fx.orders.is_empty());
}

#[tokio::test]
async fn concurrent_checkouts_for_last_unit_admit_exactly_one() {
    let fx = Arc::new(fixture());
    seed_user(&fx, 1, 0).await;
    seed_user(&fx, 2, 0).await;
    seed_product(&fx, "SKU-A", 1000, 1).await;
    seed_cart_line(&fx, 1, 1, "SKU-A", 1).await;
    seed_cart_line(&fx, 2, 2, "SKU-A", 1).await;

    let a = {
        let fx = fx.clone();
        tokio::spawn(async move { fx.service.create_order(request(1)).await })
    };
    let b = {
        let fx = fx.clone();
        tokio::spawn(async move { fx.service.create_order(request(2)).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert_eq!(fx.stock.level(&SkuId::new("SKU-A")).await.unwrap(), Some(0));
}

#[tokio::test]
async fn empty_cart_is_a_validation_error() {
    let fx = fixture();
    seed_user(&fx, 1, 0).await;

    let err = fx.service.create_order(request(1)).await.unwrap_err();
    assert!(matches!(err, TccError::Validation(_)));
}

#[tokio::test]
async fn foreign_address_is_rejected() {
    let fx = fixture();
    seed_user(&fx, 1, 0).await;
    seed_user(&fx, 2, 0).await;
    seed_product(&fx, "SKU-A", 1000, 5).await;
    seed_cart_line(&fx, 1, 1, "SKU-A", 1).await;

    let mut req = request(1);
    req.address_id = AddressId::new(20);

    let err = fx.service.create_order(req).await.unwrap_err();
    assert!(matches!(err, TccError::Validation(_)));
    assert_eq!(fx.stock.level(&SkuId::new("SKU-A")).await.unwrap(), Some(5));
}
