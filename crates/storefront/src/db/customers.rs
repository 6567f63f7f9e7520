//! Customer repository.
//!
//! Customers are created lazily: the first time an authenticated identity
//! touches the cart, a row is created from the identity provider's
//! defaults. By the time reconciliation completes, every authenticated
//! identity has exactly one Customer record.

use sqlx::{FromRow, PgPool};

use tamarind_core::{CustomerId, Email, UserId};

use super::RepositoryError;
use crate::models::{Customer, CurrentUser, ShippingAddress};

#[derive(FromRow)]
struct CustomerRow {
    id: CustomerId,
    user_ref: UserId,
    name: String,
    email: String,
}

impl CustomerRow {
    fn into_customer(self) -> Result<Customer, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Customer {
            id: self.id,
            user_ref: self.user_ref,
            name: self.name,
            email,
        })
    }
}

/// Fields accepted by the shipping address upsert.
#[derive(Debug, Clone)]
pub struct AddressInput {
    pub name: String,
    pub email: Option<String>,
    pub address: String,
    pub address2: Option<String>,
    pub city: String,
    pub state: String,
    pub zipcode: String,
}

/// Repository for customer database operations.
pub struct CustomerRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CustomerRepository<'a> {
    /// Create a new customer repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the customer for an identity-provider user reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_user_ref(
        &self,
        user_ref: UserId,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, user_ref, name, email FROM customers WHERE user_ref = $1",
        )
        .bind(user_ref)
        .fetch_optional(self.pool)
        .await?;

        row.map(CustomerRow::into_customer).transpose()
    }

    /// Get or create the customer for an authenticated user.
    ///
    /// Concurrent calls for the same user resolve to the same row: the
    /// insert is `ON CONFLICT DO NOTHING` against the `user_ref` unique
    /// constraint, and the follow-up select observes whichever request won.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails, or
    /// `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn ensure(&self, user: &CurrentUser) -> Result<Customer, RepositoryError> {
        sqlx::query(
            "INSERT INTO customers (user_ref, name, email)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_ref) DO NOTHING",
        )
        .bind(user.user_ref)
        .bind(&user.name)
        .bind(user.email.as_str())
        .execute(self.pool)
        .await?;

        self.get_by_user_ref(user.user_ref).await?.ok_or_else(|| {
            RepositoryError::Conflict(format!("customer for user {} vanished", user.user_ref))
        })
    }

    /// Upsert the customer's shipping address.
    ///
    /// One logical address per customer: a second checkout overwrites the
    /// first rather than accumulating rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_address(
        &self,
        customer_id: CustomerId,
        input: &AddressInput,
    ) -> Result<ShippingAddress, RepositoryError> {
        let address = sqlx::query_as::<_, ShippingAddress>(
            "INSERT INTO shipping_addresses
                 (customer_id, name, email, address, address2, city, state, zipcode)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (customer_id) DO UPDATE SET
                 name = EXCLUDED.name,
                 email = EXCLUDED.email,
                 address = EXCLUDED.address,
                 address2 = EXCLUDED.address2,
                 city = EXCLUDED.city,
                 state = EXCLUDED.state,
                 zipcode = EXCLUDED.zipcode,
                 updated_at = now()
             RETURNING id, customer_id, name, email, address, address2, city, state, zipcode",
        )
        .bind(customer_id)
        .bind(&input.name)
        .bind(&input.email)
        .bind(&input.address)
        .bind(&input.address2)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.zipcode)
        .fetch_one(self.pool)
        .await?;

        Ok(address)
    }

    /// The customer's shipping address, if one is on file.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn address_for(
        &self,
        customer_id: CustomerId,
    ) -> Result<Option<ShippingAddress>, RepositoryError> {
        let address = sqlx::query_as::<_, ShippingAddress>(
            "SELECT id, customer_id, name, email, address, address2, city, state, zipcode
             FROM shipping_addresses
             WHERE customer_id = $1",
        )
        .bind(customer_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(address)
    }
}
