//! Cached read-only product lookup.
//!
//! Catalog reads are the hottest path in cart materialization, so they go
//! through a short-TTL moka cache. Missing ids are not an error anywhere in
//! the cart: they are logged and omitted from the result.

use std::collections::HashMap;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use tamarind_core::ProductId;

use crate::db::{ProductRepository, RepositoryError};
use crate::models::Product;

/// Cache TTL for product reads.
const PRODUCT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Maximum number of cached products.
const PRODUCT_CACHE_CAPACITY: u64 = 10_000;

/// Cached product catalog.
#[derive(Clone)]
pub struct Catalog {
    pool: PgPool,
    cache: Cache<ProductId, Product>,
}

impl Catalog {
    /// Create a new catalog over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        let cache = Cache::builder()
            .max_capacity(PRODUCT_CACHE_CAPACITY)
            .time_to_live(PRODUCT_CACHE_TTL)
            .build();

        Self { pool, cache }
    }

    /// Look up one product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the underlying query fails;
    /// a missing product is `Ok(None)`, never an error.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        if let Some(product) = self.cache.get(&id).await {
            return Ok(Some(product));
        }

        let product = ProductRepository::new(&self.pool).get(id).await?;
        if let Some(ref product) = product {
            self.cache.insert(id, product.clone()).await;
        }
        Ok(product)
    }

    /// Resolve many ids at once.
    ///
    /// Ids that do not resolve are absent from the map; the caller treats
    /// the omission as "item dropped", not as a failure.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the underlying query fails.
    pub async fn resolve(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError> {
        let mut resolved = HashMap::with_capacity(ids.len());
        let mut misses = Vec::new();

        for id in ids {
            match self.cache.get(id).await {
                Some(product) => {
                    resolved.insert(*id, product);
                }
                None => misses.push(*id),
            }
        }

        if !misses.is_empty() {
            let fetched = ProductRepository::new(&self.pool).get_many(&misses).await?;
            for product in fetched {
                self.cache.insert(product.id, product.clone()).await;
                resolved.insert(product.id, product);
            }
        }

        if resolved.len() < ids.len() {
            tracing::debug!(
                requested = ids.len(),
                resolved = resolved.len(),
                "some cart products no longer exist in the catalog"
            );
        }

        Ok(resolved)
    }
}
