//! Order repository: open carts and finalized orders.
//!
//! The central consistency rule lives here. A customer has at most one
//! open (`complete = false`) order at any time, enforced by the partial
//! unique index `orders_one_open_per_customer` rather than by
//! check-then-create in application code. Finalization is a single guarded
//! `UPDATE .. WHERE NOT complete`, so the transaction id, payment method,
//! status and grand total always land together or not at all.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use tamarind_core::{CustomerId, Money, OrderId, OrderStatus, PaymentMethod, ProductId};

use super::RepositoryError;
use crate::cart::view::CartEntry;
use crate::models::{Order, Product};

/// Attempts at the insert-or-select dance in [`OrderRepository::ensure_open`]
/// before giving up. A retry is only needed when a concurrent finalize wins
/// the race between our insert conflicting and our select running.
const ENSURE_OPEN_ATTEMPTS: u32 = 3;

const ORDER_COLUMNS: &str = "id, customer_id, complete, status, payment_method, transaction_id, \
     gateway_order_id, grand_total, created_at, completed_at";

#[derive(FromRow)]
struct OrderRow {
    id: OrderId,
    customer_id: CustomerId,
    complete: bool,
    status: String,
    payment_method: Option<String>,
    transaction_id: Option<String>,
    gateway_order_id: Option<String>,
    grand_total: Option<Money>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, RepositoryError> {
        let status = OrderStatus::from_str(&self.status)
            .map_err(RepositoryError::DataCorruption)?;
        let payment_method = self
            .payment_method
            .as_deref()
            .map(PaymentMethod::from_str)
            .transpose()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Order {
            id: self.id,
            customer_id: self.customer_id,
            complete: self.complete,
            status,
            payment_method,
            transaction_id: self.transaction_id,
            gateway_order_id: self.gateway_order_id,
            grand_total: self.grand_total,
            created_at: self.created_at,
            completed_at: self.completed_at,
        })
    }
}

/// One line item as stored, with its product resolved where possible.
#[derive(FromRow)]
struct ItemRow {
    quantity: i32,
    product_id: Option<ProductId>,
    category_id: Option<i32>,
    name: Option<String>,
    price: Option<Money>,
    digital: Option<bool>,
}

impl ItemRow {
    fn into_entry(self) -> CartEntry {
        let product = match (self.product_id, self.name, self.price, self.digital) {
            (Some(id), Some(name), Some(price), Some(digital)) => Some(Product {
                id,
                category_id: self.category_id.map(Into::into),
                name,
                price,
                digital,
            }),
            _ => None,
        };

        #[allow(clippy::cast_sign_loss)] // quantity > 0 is a table constraint
        let quantity = self.quantity.max(0) as u32;

        CartEntry { product, quantity }
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if stored status values are invalid.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// Find the order a gateway payment was initiated for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if stored status values are invalid.
    pub async fn find_by_gateway_order(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE gateway_order_id = $1"
        ))
        .bind(gateway_order_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// Get the customer's open cart, creating it if absent.
    ///
    /// Safe under concurrent invocation for the same customer: the insert
    /// targets the `(customer_id) WHERE NOT complete` unique index with
    /// `ON CONFLICT DO NOTHING`, so two racing requests converge on one
    /// row. If a concurrent finalize completes the order between our
    /// conflict and our select, the loop simply inserts a fresh cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails, or
    /// `RepositoryError::Conflict` if the row cannot be pinned down after
    /// repeated attempts.
    pub async fn ensure_open(&self, customer_id: CustomerId) -> Result<Order, RepositoryError> {
        for _ in 0..ENSURE_OPEN_ATTEMPTS {
            sqlx::query(
                "INSERT INTO orders (customer_id)
                 VALUES ($1)
                 ON CONFLICT (customer_id) WHERE NOT complete DO NOTHING",
            )
            .bind(customer_id)
            .execute(self.pool)
            .await?;

            let row = sqlx::query_as::<_, OrderRow>(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 AND NOT complete"
            ))
            .bind(customer_id)
            .fetch_optional(self.pool)
            .await?;

            if let Some(row) = row {
                return row.into_order();
            }
        }

        Err(RepositoryError::Conflict(format!(
            "could not obtain an open order for customer {customer_id}"
        )))
    }

    /// Set the quantity of a product on an open order.
    ///
    /// Zero deletes the line item (a no-op if it was absent); a positive
    /// quantity upserts it. Runs in one transaction so a delete can never
    /// interleave with a concurrent update of the same (order, product)
    /// pair.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order is already
    /// finalized, `RepositoryError::Database` on query failure, and maps a
    /// missing order to `sqlx::Error::RowNotFound`.
    pub async fn set_quantity(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let complete = sqlx::query_scalar::<_, bool>(
            "SELECT complete FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

        if complete {
            return Err(RepositoryError::Conflict(format!(
                "order {order_id} is already finalized"
            )));
        }

        if quantity == 0 {
            sqlx::query("DELETE FROM order_items WHERE order_id = $1 AND product_id = $2")
                .bind(order_id)
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (order_id, product_id) WHERE product_id IS NOT NULL
                 DO UPDATE SET quantity = EXCLUDED.quantity",
            )
            .bind(order_id)
            .bind(product_id)
            .bind(i64::from(quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// The order's line items with their products resolved where possible.
    ///
    /// Items whose product was deleted from the catalog come back with
    /// `product = None`; totals treat them as zero-priced.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn entries(&self, order_id: OrderId) -> Result<Vec<CartEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT oi.quantity, p.id AS product_id, p.category_id, p.name, p.price, p.digital
             FROM order_items oi
             LEFT JOIN products p ON p.id = oi.product_id
             WHERE oi.order_id = $1
             ORDER BY oi.added_at, oi.id",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(ItemRow::into_entry).collect())
    }

    /// Record the gateway's order identifier on a still-open order.
    ///
    /// Called only after the gateway has confirmed order creation; a failed
    /// or timed-out remote call leaves the row untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order is no longer open,
    /// `RepositoryError::Database` on query failure.
    pub async fn set_gateway_order(
        &self,
        order_id: OrderId,
        gateway_order_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET gateway_order_id = $2 WHERE id = $1 AND NOT complete",
        )
        .bind(order_id)
        .bind(gateway_order_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "order {order_id} is not open"
            )));
        }
        Ok(())
    }

    /// Finalize an order: the one-way, one-time transition.
    ///
    /// Everything is stamped in a single guarded statement; returns `None`
    /// if the order was already complete (the caller decides whether that
    /// is idempotent success or a conflict).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if the returned row is invalid.
    pub async fn finalize(
        &self,
        order_id: OrderId,
        transaction_id: &str,
        method: PaymentMethod,
        status: OrderStatus,
        grand_total: Money,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "UPDATE orders
             SET complete = TRUE,
                 transaction_id = $2,
                 payment_method = $3,
                 status = $4,
                 grand_total = $5,
                 completed_at = now()
             WHERE id = $1 AND NOT complete
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(transaction_id)
        .bind(method.to_string())
        .bind(status.to_string())
        .bind(grand_total)
        .fetch_optional(self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// Record a failed payment confirmation without completing the order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_payment_failed(&self, order_id: OrderId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1 AND NOT complete")
            .bind(order_id)
            .bind(OrderStatus::PaymentFailed.to_string())
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// The customer's most recently finalized order, for the confirmation
    /// page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if stored status values are invalid.
    pub async fn latest_complete_for(
        &self,
        customer_id: CustomerId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE customer_id = $1 AND complete
             ORDER BY completed_at DESC
             LIMIT 1"
        ))
        .bind(customer_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }
}
