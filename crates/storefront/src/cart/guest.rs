//! The guest cart: a client-held cookie, never trusted.
//!
//! Anonymous shoppers carry their cart as a JSON cookie mapping product id
//! to quantity, e.g. `{"1": 2, "7": 1}`. Nothing about it is assumed
//! well-formed: a malformed cookie decodes to an empty cart, malformed
//! entries are dropped, and entries pointing at products no longer in the
//! catalog are omitted from totals. A stale guest cart must never hard-fail
//! a page.

use std::collections::{BTreeMap, HashMap};

use tamarind_core::ProductId;

use super::view::{CartEntry, CartView};
use crate::models::Product;

/// An anonymous shopper's cart, keyed by product.
///
/// Quantities are positive-or-absent: setting a quantity of zero removes
/// the entry rather than storing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestCart(BTreeMap<ProductId, u32>);

impl GuestCart {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a cart cookie, degrading gracefully.
    ///
    /// Whole-cookie parse failures yield an empty cart; per-entry problems
    /// (non-numeric key, non-positive or non-integer quantity) drop that
    /// entry only.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        let Ok(parsed) = serde_json::from_str::<HashMap<String, serde_json::Value>>(raw) else {
            if !raw.is_empty() {
                tracing::debug!("discarding malformed cart cookie");
            }
            return Self::new();
        };

        let mut cart = BTreeMap::new();
        for (key, value) in parsed {
            let (Ok(id), Some(quantity)) = (key.parse::<i32>(), value.as_i64()) else {
                tracing::debug!(entry = %key, "dropping malformed cart cookie entry");
                continue;
            };
            if let Ok(quantity) = u32::try_from(quantity)
                && quantity > 0
            {
                cart.insert(ProductId::new(id), quantity);
            }
        }
        Self(cart)
    }

    /// Encode the cart back into its cookie form.
    ///
    /// Key order is deterministic, so equal carts encode identically.
    #[must_use]
    pub fn encode(&self) -> String {
        let map: BTreeMap<String, u32> = self
            .0
            .iter()
            .map(|(id, quantity)| (id.to_string(), *quantity))
            .collect();
        serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_owned())
    }

    /// Set the quantity for a product; zero removes the entry.
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 {
            self.0.remove(&product_id);
        } else {
            self.0.insert(product_id, quantity);
        }
    }

    /// The product ids currently in the cart.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.0.keys().copied().collect()
    }

    /// Whether the cart holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Price the cart against resolved catalog products.
    ///
    /// Entries absent from `products` are dropped from the totals and
    /// counted as orphaned on the view.
    #[must_use]
    pub fn materialize(&self, products: &HashMap<ProductId, Product>) -> CartView {
        let entries = self
            .0
            .iter()
            .map(|(id, quantity)| {
                let product = products.get(id).cloned();
                if product.is_none() {
                    tracing::debug!(product_id = %id, "cart references unknown product");
                }
                CartEntry {
                    product,
                    quantity: *quantity,
                }
            })
            .collect();

        CartView::build(entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, price: &str, digital: bool) -> Product {
        Product {
            id: ProductId::new(id),
            category_id: None,
            name: format!("product-{id}"),
            price: price.parse().unwrap(),
            digital,
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<ProductId, Product> {
        products.into_iter().map(|p| (p.id, p)).collect()
    }

    #[test]
    fn test_decode_malformed_is_empty() {
        assert!(GuestCart::decode("not json").is_empty());
        assert!(GuestCart::decode("").is_empty());
        assert!(GuestCart::decode("[1, 2, 3]").is_empty());
    }

    #[test]
    fn test_decode_drops_bad_entries() {
        let cart = GuestCart::decode(r#"{"1": 2, "oops": 3, "2": "two", "3": -1, "4": 0}"#);
        assert_eq!(cart.product_ids(), vec![ProductId::new(1)]);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut cart = GuestCart::new();
        cart.set_quantity(ProductId::new(7), 1);
        cart.set_quantity(ProductId::new(1), 2);

        let decoded = GuestCart::decode(&cart.encode());
        assert_eq!(decoded, cart);
        // Deterministic key order: encoding twice yields the same string.
        assert_eq!(cart.encode(), decoded.encode());
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut cart = GuestCart::decode(r#"{"1": 2}"#);
        cart.set_quantity(ProductId::new(1), 0);
        assert!(cart.is_empty());
        assert_eq!(cart.encode(), "{}");
    }

    #[test]
    fn test_materialize_scenario() {
        // Product A (19.99, physical) x2 and B (5.00, digital) x3.
        let products = catalog(vec![
            product(1, "19.99", false),
            product(2, "5.00", true),
        ]);
        let cart = GuestCart::decode(r#"{"1": 2, "2": 3}"#);

        let view = cart.materialize(&products);
        assert_eq!(view.subtotal, "54.98".parse().unwrap());
        assert_eq!(view.item_count, 5);
        assert!(view.requires_shipping);
    }

    #[test]
    fn test_materialize_skips_unknown_products() {
        let products = catalog(vec![product(1, "10.00", false)]);
        let cart = GuestCart::decode(r#"{"1": 1, "99": 5}"#);

        let view = cart.materialize(&products);
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.item_count, 1);
        assert_eq!(view.subtotal, "10.00".parse().unwrap());
        assert_eq!(view.orphaned_items, 1);
    }

    #[test]
    fn test_materialize_roundtrip_law() {
        let products = catalog(vec![
            product(1, "19.99", false),
            product(2, "5.00", true),
        ]);
        let cart = GuestCart::decode(r#"{"1": 2, "2": 3}"#);
        let reencoded = GuestCart::decode(&cart.encode());

        let a = cart.materialize(&products);
        let b = reencoded.materialize(&products);
        assert_eq!(a.subtotal, b.subtotal);
        assert_eq!(a.item_count, b.item_count);
        assert_eq!(a.requires_shipping, b.requires_shipping);
    }
}
