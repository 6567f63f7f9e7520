//! Catalog seeding command.
//!
//! Populates the demo catalog: four categories and a spread of physical
//! and digital products across them. Safe to re-run; categories upsert and
//! products accumulate unless `--clear` is given.

use tracing::info;

use tamarind_core::CategoryId;
use tamarind_storefront::db::{self, ProductRepository};

use super::{CommandError, database_url};

/// Demo catalog: (name, price, digital, category).
const DEMO_PRODUCTS: &[(&str, &str, bool, &str)] = &[
    ("Bluetooth Speaker", "59.99", false, "Electronics"),
    ("Mechanical Keyboard", "129.50", false, "Electronics"),
    ("USB-C Charging Hub", "34.00", false, "Electronics"),
    ("Noise-Cancelling Earbuds", "89.99", false, "Electronics"),
    ("The Long Monsoon (Paperback)", "14.50", false, "Books"),
    ("City of Looms (Hardcover)", "24.00", false, "Books"),
    ("Practical Woodworking (E-book)", "9.99", true, "Books"),
    ("Street Food Atlas (E-book)", "12.00", true, "Books"),
    ("Linen Kurta", "39.99", false, "Apparel"),
    ("Canvas Sneakers", "54.50", false, "Apparel"),
    ("Woollen Scarf", "22.00", false, "Apparel"),
    ("Cast Iron Skillet", "47.25", false, "Home Goods"),
    ("Ceramic Dinner Set", "78.00", false, "Home Goods"),
    ("Jute Floor Rug", "55.00", false, "Home Goods"),
    ("Herb Garden Starter Kit", "19.99", false, "Home Goods"),
];

const CATEGORIES: &[&str] = &["Electronics", "Books", "Apparel", "Home Goods"];

/// Seed the catalog with demo data.
///
/// # Arguments
///
/// * `clear_existing` - If true, delete existing products and categories first
///
/// # Errors
///
/// Returns an error if the database URL is missing or a query fails.
pub async fn catalog(clear_existing: bool) -> Result<(), CommandError> {
    let url = database_url()?;

    let pool = db::create_pool(&url).await?;
    info!("Connected to database");

    if clear_existing {
        // Line items referencing these products are orphaned (SET NULL),
        // which the cart tolerates; open carts survive a reseed.
        sqlx::query("DELETE FROM products").execute(&pool).await?;
        sqlx::query("DELETE FROM categories").execute(&pool).await?;
        info!("Cleared existing products and categories");
    }

    let products = ProductRepository::new(&pool);

    let mut category_ids: Vec<(&str, CategoryId)> = Vec::with_capacity(CATEGORIES.len());
    for name in CATEGORIES {
        let slug = name.to_lowercase().replace(' ', "-");
        let category = products.insert_category(name, &slug).await?;
        category_ids.push((name, category.id));
    }
    info!(count = category_ids.len(), "Seeded categories");

    let mut seeded = 0usize;
    for (name, price, digital, category_name) in DEMO_PRODUCTS {
        let category_id = category_ids
            .iter()
            .find(|(n, _)| n == category_name)
            .map(|(_, id)| *id);

        let price = price
            .parse()
            .map_err(|_| CommandError::SeedData(format!("bad price for {name}: {price}")))?;

        products.insert(name, price, *digital, category_id).await?;
        seeded += 1;
    }

    info!(count = seeded, "Seeded demo products");
    Ok(())
}
