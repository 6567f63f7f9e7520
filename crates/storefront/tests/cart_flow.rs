//! End-to-end cart and checkout flows against a real Postgres.
//!
//! These tests exercise the storage-level invariants that unit tests
//! cannot: the one-open-order rule under concurrency, transactional line
//! item updates, and the one-way finalize transition. They are ignored by
//! default; point `TAMARIND_TEST_DATABASE_URL` (or `DATABASE_URL`) at a
//! scratch database and run with `cargo test -- --ignored`.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicI32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use tamarind_core::{CurrencyCode, Email, Money, OrderStatus, PaymentMethod, ProductId, UserId};
use tamarind_storefront::cart::{CartService, CartView, ShopperIdentity};
use tamarind_storefront::catalog::Catalog;
use tamarind_storefront::checkout::{CheckoutError, CheckoutService};
use tamarind_storefront::db::customers::AddressInput;
use tamarind_storefront::db::{CustomerRepository, OrderRepository, ProductRepository};
use tamarind_storefront::models::{CurrentUser, Customer, Product};
use tamarind_storefront::payment::{GatewayError, PaymentGateway, SignatureError};

static USER_COUNTER: AtomicI32 = AtomicI32::new(0);

/// A gateway double: hands out a fixed order id and accepts exactly the
/// signature `"valid"`.
struct MockGateway {
    order_id: String,
}

impl PaymentGateway for MockGateway {
    async fn create_order(
        &self,
        _amount_minor_units: i64,
        _currency: CurrencyCode,
        _receipt: &str,
    ) -> Result<String, GatewayError> {
        Ok(self.order_id.clone())
    }

    fn verify_signature(
        &self,
        _gateway_order_id: &str,
        _payment_id: &str,
        signature: &str,
    ) -> Result<(), SignatureError> {
        if signature == "valid" {
            Ok(())
        } else {
            Err(SignatureError)
        }
    }
}

async fn test_pool() -> PgPool {
    let url = std::env::var("TAMARIND_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("set TAMARIND_TEST_DATABASE_URL to run the database tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .expect("failed to connect to the test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations failed");

    pool
}

/// A user reference that no other test run has used.
fn fresh_user(tag: &str) -> CurrentUser {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .subsec_nanos();
    let serial = USER_COUNTER.fetch_add(1, Ordering::Relaxed);
    #[allow(clippy::cast_possible_wrap)]
    let user_ref = (nanos as i32 / 1000) * 1000 + serial;

    CurrentUser {
        user_ref: UserId::new(user_ref),
        name: format!("{tag}-{user_ref}"),
        email: Email::parse(&format!("{tag}-{user_ref}@example.com")).unwrap(),
    }
}

async fn seed_product(pool: &PgPool, name: &str, price: &str, digital: bool) -> Product {
    ProductRepository::new(pool)
        .insert(name, price.parse().unwrap(), digital, None)
        .await
        .unwrap()
}

async fn customer_with_cart(pool: &PgPool, tag: &str) -> (CurrentUser, Customer) {
    let user = fresh_user(tag);
    let customer = CustomerRepository::new(pool).ensure(&user).await.unwrap();
    (user, customer)
}

async fn put_address(pool: &PgPool, customer: &Customer) {
    CustomerRepository::new(pool)
        .upsert_address(
            customer.id,
            &AddressInput {
                name: customer.name.clone(),
                email: Some(customer.email.to_string()),
                address: "12 Harbour Lane".to_owned(),
                address2: None,
                city: "Pune".to_owned(),
                state: "MH".to_owned(),
                zipcode: "411001".to_owned(),
            },
        )
        .await
        .unwrap();
}

async fn open_order_count(pool: &PgPool, customer: &Customer) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM orders WHERE customer_id = $1 AND NOT complete",
    )
    .bind(customer.id)
    .fetch_one(pool)
    .await
    .unwrap()
}

fn checkout<'a>(
    pool: &'a PgPool,
    gateway: &'a MockGateway,
) -> CheckoutService<'a, MockGateway> {
    CheckoutService::new(
        pool,
        gateway,
        "10.00".parse().unwrap(),
        CurrencyCode::INR,
    )
}

#[tokio::test]
#[ignore = "requires a local Postgres"]
async fn concurrent_ensure_open_creates_a_single_order() {
    let pool = test_pool().await;
    let (_, customer) = customer_with_cart(&pool, "race").await;

    let orders = OrderRepository::new(&pool);
    let (a, b) = tokio::join!(
        orders.ensure_open(customer.id),
        orders.ensure_open(customer.id)
    );

    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(open_order_count(&pool, &customer).await, 1);
}

#[tokio::test]
#[ignore = "requires a local Postgres"]
async fn set_quantity_zero_removes_the_line() {
    let pool = test_pool().await;
    let catalog = Catalog::new(pool.clone());
    let (user, _) = customer_with_cart(&pool, "setqty").await;
    let product = seed_product(&pool, "Walnut Desk", "129.50", false).await;

    let carts = CartService::new(&pool, &catalog);
    let identity = ShopperIdentity::Customer(user);

    let outcome = carts.set_quantity(&identity, product.id, 2).await.unwrap();
    assert_eq!(outcome.view.item_count, 2);
    assert!(outcome.cookie.is_none());

    let outcome = carts.set_quantity(&identity, product.id, 0).await.unwrap();
    assert!(outcome.view.is_empty());
    assert!(
        !outcome
            .view
            .lines
            .iter()
            .any(|line| line.product.id == product.id)
    );
}

#[tokio::test]
#[ignore = "requires a local Postgres"]
async fn set_quantity_upserts_one_row_per_product() {
    let pool = test_pool().await;
    let catalog = Catalog::new(pool.clone());
    let (user, _) = customer_with_cart(&pool, "upsert").await;
    let product = seed_product(&pool, "Brass Kettle", "45.00", false).await;

    let carts = CartService::new(&pool, &catalog);
    let identity = ShopperIdentity::Customer(user);

    carts.set_quantity(&identity, product.id, 2).await.unwrap();
    let outcome = carts.set_quantity(&identity, product.id, 5).await.unwrap();

    assert_eq!(outcome.view.lines.len(), 1);
    assert_eq!(outcome.view.item_count, 5);
    assert_eq!(outcome.view.subtotal, "225.00".parse::<Money>().unwrap());
}

#[tokio::test]
#[ignore = "requires a local Postgres"]
async fn finalize_cod_rejects_an_empty_cart() {
    let pool = test_pool().await;
    let (user, customer) = customer_with_cart(&pool, "codempty").await;
    put_address(&pool, &customer).await;

    let catalog = Catalog::new(pool.clone());
    let carts = CartService::new(&pool, &catalog);
    let (_, order) = carts.ensure_open_cart(&user).await.unwrap();

    let gateway = MockGateway {
        order_id: "unused".to_owned(),
    };
    let result = checkout(&pool, &gateway).finalize_cod(order.id).await;
    assert!(matches!(result, Err(CheckoutError::EmptyCart)));

    // Nothing was mutated: the cart is still open.
    assert_eq!(open_order_count(&pool, &customer).await, 1);
}

#[tokio::test]
#[ignore = "requires a local Postgres"]
async fn finalize_cod_requires_an_address() {
    let pool = test_pool().await;
    let (user, _) = customer_with_cart(&pool, "codnoaddr").await;
    let product = seed_product(&pool, "Linen Throw", "30.00", false).await;

    let catalog = Catalog::new(pool.clone());
    let carts = CartService::new(&pool, &catalog);
    let identity = ShopperIdentity::Customer(user.clone());
    carts.set_quantity(&identity, product.id, 1).await.unwrap();
    let (_, order) = carts.ensure_open_cart(&user).await.unwrap();

    let gateway = MockGateway {
        order_id: "unused".to_owned(),
    };
    let result = checkout(&pool, &gateway).finalize_cod(order.id).await;
    assert!(matches!(result, Err(CheckoutError::MissingAddress)));
}

#[tokio::test]
#[ignore = "requires a local Postgres"]
async fn finalize_cod_happy_path_is_one_way() {
    let pool = test_pool().await;
    let (user, customer) = customer_with_cart(&pool, "codok").await;
    put_address(&pool, &customer).await;
    let product = seed_product(&pool, "Cane Chair", "89.99", false).await;

    let catalog = Catalog::new(pool.clone());
    let carts = CartService::new(&pool, &catalog);
    let identity = ShopperIdentity::Customer(user.clone());
    carts.set_quantity(&identity, product.id, 2).await.unwrap();
    let (_, order) = carts.ensure_open_cart(&user).await.unwrap();

    let gateway = MockGateway {
        order_id: "unused".to_owned(),
    };
    let service = checkout(&pool, &gateway);

    let finalized = service.finalize_cod(order.id).await.unwrap();
    assert!(finalized.complete);
    assert_eq!(finalized.status, OrderStatus::Pending);
    assert_eq!(finalized.payment_method, Some(PaymentMethod::Cod));
    assert!(finalized.transaction_id.unwrap().starts_with("COD-"));
    // 89.99 x 2 + 10.00 shipping
    assert_eq!(
        finalized.grand_total,
        Some("189.98".parse::<Money>().unwrap())
    );

    // Re-finalizing a complete order is a conflict, not a second receipt.
    let again = service.finalize_cod(order.id).await;
    assert!(matches!(again, Err(CheckoutError::AlreadyFinalized)));
    assert_eq!(open_order_count(&pool, &customer).await, 0);
}

#[tokio::test]
#[ignore = "requires a local Postgres"]
async fn confirm_gateway_payment_is_idempotent() {
    let pool = test_pool().await;
    let (user, customer) = customer_with_cart(&pool, "gwok").await;
    put_address(&pool, &customer).await;
    let product = seed_product(&pool, "Ebook Bundle", "19.99", true).await;

    let catalog = Catalog::new(pool.clone());
    let carts = CartService::new(&pool, &catalog);
    let identity = ShopperIdentity::Customer(user.clone());
    carts.set_quantity(&identity, product.id, 1).await.unwrap();
    let (_, order) = carts.ensure_open_cart(&user).await.unwrap();

    let gateway = MockGateway {
        order_id: format!("order_test_{}", customer.id),
    };
    let service = checkout(&pool, &gateway);

    let handoff = service.initiate_gateway_payment(order.id).await.unwrap();
    // 19.99 + 10.00 shipping, in minor units.
    assert_eq!(handoff.amount_minor_units, 2999);

    let first = service
        .confirm_gateway_payment(&handoff.gateway_order_id, "pay_001", "valid")
        .await
        .unwrap();
    assert!(first.complete);
    assert_eq!(first.status, OrderStatus::Paid);
    assert_eq!(first.payment_method, Some(PaymentMethod::Razorpay));
    assert_eq!(first.transaction_id.as_deref(), Some("pay_001"));

    // Webhook retry: same parameters, no new transaction.
    let second = service
        .confirm_gateway_payment(&handoff.gateway_order_id, "pay_001", "valid")
        .await
        .unwrap();
    assert_eq!(second.transaction_id, first.transaction_id);
    assert_eq!(second.completed_at, first.completed_at);

    // A different payment against the same finalized order is a conflict.
    let conflicting = service
        .confirm_gateway_payment(&handoff.gateway_order_id, "pay_002", "valid")
        .await;
    assert!(matches!(conflicting, Err(CheckoutError::AlreadyFinalized)));
}

#[tokio::test]
#[ignore = "requires a local Postgres"]
async fn failed_signature_never_completes_the_order() {
    let pool = test_pool().await;
    let (user, customer) = customer_with_cart(&pool, "gwbad").await;
    put_address(&pool, &customer).await;
    let product = seed_product(&pool, "Clay Planter", "25.00", false).await;

    let catalog = Catalog::new(pool.clone());
    let carts = CartService::new(&pool, &catalog);
    let identity = ShopperIdentity::Customer(user.clone());
    carts.set_quantity(&identity, product.id, 1).await.unwrap();
    let (_, order) = carts.ensure_open_cart(&user).await.unwrap();

    let gateway = MockGateway {
        order_id: format!("order_bad_{}", customer.id),
    };
    let service = checkout(&pool, &gateway);
    let handoff = service.initiate_gateway_payment(order.id).await.unwrap();

    let result = service
        .confirm_gateway_payment(&handoff.gateway_order_id, "pay_001", "forged")
        .await;
    assert!(matches!(result, Err(CheckoutError::Signature(_))));

    let order = OrderRepository::new(&pool).get(order.id).await.unwrap().unwrap();
    assert!(!order.complete);
    assert_eq!(order.status, OrderStatus::PaymentFailed);
    assert!(order.transaction_id.is_none());
}

#[tokio::test]
#[ignore = "requires a local Postgres"]
async fn deleted_product_orphans_the_line_item() {
    let pool = test_pool().await;
    let (user, _) = customer_with_cart(&pool, "orphan").await;
    let kept = seed_product(&pool, "Oak Shelf", "75.00", false).await;
    let doomed = seed_product(&pool, "Retired Lamp", "40.00", false).await;

    let catalog = Catalog::new(pool.clone());
    let carts = CartService::new(&pool, &catalog);
    let identity = ShopperIdentity::Customer(user);
    carts.set_quantity(&identity, kept.id, 1).await.unwrap();
    carts.set_quantity(&identity, doomed.id, 3).await.unwrap();

    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(doomed.id)
        .execute(&pool)
        .await
        .unwrap();

    let view = carts.view(&identity).await.unwrap();
    assert_eq!(view.lines.len(), 1);
    assert_eq!(view.subtotal, "75.00".parse::<Money>().unwrap());
    assert_eq!(view.item_count, 1);
    assert_eq!(view.orphaned_items, 1);
}

#[tokio::test]
#[ignore = "requires a local Postgres"]
async fn catalog_resolve_drops_unknown_ids() {
    let pool = test_pool().await;
    let product = seed_product(&pool, "Jute Rug", "55.00", false).await;

    let catalog = Catalog::new(pool.clone());
    let resolved = catalog
        .resolve(&[product.id, ProductId::new(i32::MAX)])
        .await
        .unwrap();

    assert_eq!(resolved.len(), 1);
    assert!(resolved.contains_key(&product.id));
}

#[tokio::test]
#[ignore = "requires a local Postgres"]
async fn guest_view_materializes_against_the_catalog() {
    let pool = test_pool().await;
    let a = seed_product(&pool, "Teak Tray", "19.99", false).await;
    let b = seed_product(&pool, "Audio Course", "5.00", true).await;

    let catalog = Catalog::new(pool.clone());
    let carts = CartService::new(&pool, &catalog);
    let identity = ShopperIdentity::Guest {
        cart_cookie: Some(format!(r#"{{"{}": 2, "{}": 3, "999999": 1}}"#, a.id, b.id)),
    };

    let view: CartView = carts.view(&identity).await.unwrap();
    assert_eq!(view.subtotal, "54.98".parse::<Money>().unwrap());
    assert_eq!(view.item_count, 5);
    assert!(view.requires_shipping);
    assert_eq!(view.orphaned_items, 1);
}
