//! The unified cart view.
//!
//! Both backends - database carts for signed-in customers and cookie carts
//! for guests - materialize into the same [`CartView`] value, so everything
//! downstream (totals, checkout guards, the JSON surface) is
//! backend-agnostic.

use serde::Serialize;

use tamarind_core::Money;

use crate::models::Product;

/// A raw cart entry before totals are computed.
///
/// `product` is `None` when the reference could not be resolved: an
/// orphaned database line item, or a guest cookie entry for a product no
/// longer in the catalog.
#[derive(Debug, Clone)]
pub struct CartEntry {
    pub product: Option<Product>,
    pub quantity: u32,
}

/// One priced line in the cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
    pub line_total: Money,
}

/// The materialized cart.
#[derive(Debug, Clone, Serialize, Default)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    /// Sum of `price × quantity` over resolved lines.
    pub subtotal: Money,
    /// Sum of quantities over resolved lines.
    pub item_count: u32,
    /// True if any resolved line is a physical product.
    pub requires_shipping: bool,
    /// Entries whose product reference did not resolve. They contribute
    /// nothing to the totals but are surfaced rather than silently counted
    /// at a stale price.
    pub orphaned_items: u32,
}

impl CartView {
    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compute totals over raw entries.
    ///
    /// Unresolved entries are excluded from every total and reported via
    /// `orphaned_items`; zero-quantity entries contribute nothing.
    #[must_use]
    pub fn build(entries: Vec<CartEntry>) -> Self {
        let mut view = Self::empty();

        for entry in entries {
            if entry.quantity == 0 {
                continue;
            }
            match entry.product {
                Some(product) => {
                    let line_total = product.price * entry.quantity;
                    view.subtotal += line_total;
                    view.item_count += entry.quantity;
                    if !product.digital {
                        view.requires_shipping = true;
                    }
                    view.lines.push(CartLine {
                        product,
                        quantity: entry.quantity,
                        line_total,
                    });
                }
                None => view.orphaned_items += 1,
            }
        }

        view
    }

    /// Whether the cart has anything purchasable in it.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tamarind_core::ProductId;

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

    #[test]
    fn test_empty_view() {
        let view = CartView::empty();
        assert!(view.is_empty());
        assert_eq!(view.item_count, 0);
        assert!(view.subtotal.is_zero());
        assert!(!view.requires_shipping);
    }

    #[test]
    fn test_totals_over_mixed_cart() {
        // Physical A at 19.99 x2, digital B at 5.00 x3.
        let view = CartView::build(vec![
            CartEntry {
                product: Some(product(1, "19.99", false)),
                quantity: 2,
            },
            CartEntry {
                product: Some(product(2, "5.00", true)),
                quantity: 3,
            },
        ]);

        assert_eq!(view.subtotal, "54.98".parse().unwrap());
        assert_eq!(view.item_count, 5);
        assert!(view.requires_shipping);
        assert_eq!(view.orphaned_items, 0);
        assert_eq!(view.lines.len(), 2);
    }

    #[test]
    fn test_digital_only_cart_needs_no_shipping() {
        let view = CartView::build(vec![CartEntry {
            product: Some(product(2, "5.00", true)),
            quantity: 1,
        }]);

        assert!(!view.requires_shipping);
    }

    #[test]
    fn test_orphaned_entries_are_flagged_not_priced() {
        let view = CartView::build(vec![
            CartEntry {
                product: Some(product(1, "10.00", false)),
                quantity: 1,
            },
            CartEntry {
                product: None,
                quantity: 4,
            },
        ]);

        assert_eq!(view.subtotal, "10.00".parse().unwrap());
        assert_eq!(view.item_count, 1);
        assert_eq!(view.orphaned_items, 1);
    }

    #[test]
    fn test_zero_quantity_entries_are_dropped() {
        let view = CartView::build(vec![CartEntry {
            product: Some(product(1, "10.00", false)),
            quantity: 0,
        }]);

        assert!(view.is_empty());
        assert!(view.subtotal.is_zero());
    }
}
