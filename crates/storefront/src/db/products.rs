//! Product repository for catalog reads and seeding.

use sqlx::PgPool;

use tamarind_core::{CategoryId, Money, ProductId};

use super::RepositoryError;
use crate::models::{Category, Product};

/// Repository for catalog database operations.
///
/// Pure reads from the cart's perspective; the insert methods exist for
/// the seeding CLI only.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, category_id, name, price, digital FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// Fetch all products matching the given IDs in one query.
    ///
    /// IDs with no matching product are simply absent from the result;
    /// the caller decides whether that matters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw_ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, category_id, name, price, digital FROM products WHERE id = ANY($1)",
        )
        .bind(&raw_ids)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// List products, optionally filtered by category slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, category_slug: Option<&str>) -> Result<Vec<Product>, RepositoryError> {
        let products = match category_slug {
            Some(slug) => {
                sqlx::query_as::<_, Product>(
                    "SELECT p.id, p.category_id, p.name, p.price, p.digital
                     FROM products p
                     JOIN categories c ON c.id = p.category_id
                     WHERE c.slug = $1
                     ORDER BY p.id",
                )
                .bind(slug)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Product>(
                    "SELECT id, category_id, name, price, digital FROM products ORDER BY id",
                )
                .fetch_all(self.pool)
                .await?
            }
        };

        Ok(products)
    }

    /// List all categories.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug FROM categories ORDER BY name",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(categories)
    }

    /// Insert a category, returning the existing row if the name is taken.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_category(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<Category, RepositoryError> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, slug)
             VALUES ($1, $2)
             ON CONFLICT (name) DO UPDATE SET slug = EXCLUDED.slug
             RETURNING id, name, slug",
        )
        .bind(name)
        .bind(slug)
        .fetch_one(self.pool)
        .await?;

        Ok(category)
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert(
        &self,
        name: &str,
        price: Money,
        digital: bool,
        category_id: Option<CategoryId>,
    ) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(
            "INSERT INTO products (name, price, digital, category_id)
             VALUES ($1, $2, $3, $4)
             RETURNING id, category_id, name, price, digital",
        )
        .bind(name)
        .bind(price)
        .bind(digital)
        .bind(category_id)
        .fetch_one(self.pool)
        .await?;

        Ok(product)
    }
}
