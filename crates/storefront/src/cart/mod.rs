//! Cart reconciliation: one view, one mutation surface, two backends.
//!
//! A request arrives with an identity. Authenticated shoppers get the
//! database-backed cart (the customer record and open order are ensured
//! first); anonymous shoppers get the cookie-backed cart, and every guest
//! mutation hands back a fresh cookie for the caller to persist. Guests
//! never move past an open cart here: checkout requires authentication.

pub mod guest;
pub mod view;

use std::collections::HashMap;

use sqlx::PgPool;
use tracing::instrument;

use tamarind_core::ProductId;

use crate::catalog::Catalog;
use crate::db::{CustomerRepository, OrderRepository, RepositoryError};
use crate::models::{CurrentUser, Customer, Order, Product};

pub use guest::GuestCart;
pub use view::{CartEntry, CartLine, CartView};

/// Who is shopping.
#[derive(Debug, Clone)]
pub enum ShopperIdentity {
    /// An authenticated user, as handed over by the identity provider.
    Customer(CurrentUser),
    /// An anonymous shopper carrying (at most) a cart cookie.
    Guest { cart_cookie: Option<String> },
}

/// The result of a cart operation.
#[derive(Debug)]
pub struct CartOutcome {
    pub view: CartView,
    /// For guests, the re-encoded cookie the caller must persist back to
    /// the client. `None` for authenticated shoppers, whose cart lives in
    /// the database.
    pub cookie: Option<String>,
}

/// The cart reconciler.
pub struct CartService<'a> {
    pool: &'a PgPool,
    catalog: &'a Catalog,
}

impl<'a> CartService<'a> {
    /// Create a new cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, catalog: &'a Catalog) -> Self {
        Self { pool, catalog }
    }

    /// Get or create the customer record and their open cart.
    ///
    /// The single idempotent entry point for "this identity is about to
    /// touch a cart": both halves are atomic get-or-creates backed by
    /// store-level uniqueness, so concurrent requests converge on one
    /// customer row and one open order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if either lookup or insert fails.
    pub async fn ensure_open_cart(
        &self,
        user: &CurrentUser,
    ) -> Result<(Customer, Order), RepositoryError> {
        let customer = CustomerRepository::new(self.pool).ensure(user).await?;
        let order = OrderRepository::new(self.pool)
            .ensure_open(customer.id)
            .await?;
        Ok((customer, order))
    }

    /// The unified cart view for any identity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` on database failure. Guest cookie
    /// problems never error; they degrade to omitted items.
    #[instrument(skip(self, identity))]
    pub async fn view(&self, identity: &ShopperIdentity) -> Result<CartView, RepositoryError> {
        match identity {
            ShopperIdentity::Customer(user) => {
                let (_, order) = self.ensure_open_cart(user).await?;
                self.account_view(&order).await
            }
            ShopperIdentity::Guest { cart_cookie } => {
                let cart = GuestCart::decode(cart_cookie.as_deref().unwrap_or_default());
                self.guest_view(&cart).await
            }
        }
    }

    /// Set the quantity of a product, whatever the backend.
    ///
    /// Zero removes the item. For guests the mutation happens on the
    /// decoded cookie and the outcome carries the new cookie to persist.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` on database failure, including a conflict
    /// if an authenticated cart was finalized by a concurrent request.
    #[instrument(skip(self, identity))]
    pub async fn set_quantity(
        &self,
        identity: &ShopperIdentity,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartOutcome, RepositoryError> {
        match identity {
            ShopperIdentity::Customer(user) => {
                let (_, order) = self.ensure_open_cart(user).await?;
                OrderRepository::new(self.pool)
                    .set_quantity(order.id, product_id, quantity)
                    .await?;
                let view = self.account_view(&order).await?;
                Ok(CartOutcome { view, cookie: None })
            }
            ShopperIdentity::Guest { cart_cookie } => {
                let mut cart = GuestCart::decode(cart_cookie.as_deref().unwrap_or_default());
                cart.set_quantity(product_id, quantity);
                let view = self.guest_view(&cart).await?;
                Ok(CartOutcome {
                    view,
                    cookie: Some(cart.encode()),
                })
            }
        }
    }

    /// Remove a product from the cart. Equivalent to setting quantity zero.
    ///
    /// # Errors
    ///
    /// See [`CartService::set_quantity`].
    pub async fn remove(
        &self,
        identity: &ShopperIdentity,
        product_id: ProductId,
    ) -> Result<CartOutcome, RepositoryError> {
        self.set_quantity(identity, product_id, 0).await
    }

    async fn account_view(&self, order: &Order) -> Result<CartView, RepositoryError> {
        let entries = OrderRepository::new(self.pool).entries(order.id).await?;
        Ok(CartView::build(entries))
    }

    async fn guest_view(&self, cart: &GuestCart) -> Result<CartView, RepositoryError> {
        let products: HashMap<ProductId, Product> =
            self.catalog.resolve(&cart.product_ids()).await?;
        Ok(cart.materialize(&products))
    }
}
