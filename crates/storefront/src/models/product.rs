//! Catalog models.

use serde::Serialize;
use sqlx::FromRow;

use tamarind_core::{CategoryId, Money, ProductId};

/// A product category.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// URL-safe identifier used for catalog filtering.
    pub slug: String,
}

/// A catalog product.
///
/// Immutable from the cart's perspective; the cart only ever reads
/// identity, price and the digital flag.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub price: Money,
    /// Digital goods never require shipping.
    pub digital: bool,
}
