//! The wishlist: a set of product snapshots.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::product::ProductSnapshot;

/// The client's mirror of the server wishlist.
///
/// Each product ID appears at most once. [`Wishlist::from_products`]
/// collapses duplicates, keeping the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wishlist {
    products: Vec<ProductSnapshot>,
}

impl Wishlist {
    /// An empty wishlist.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            products: Vec::new(),
        }
    }

    /// Build a wishlist from a server payload, dropping repeated product IDs.
    #[must_use]
    pub fn from_products(products: Vec<ProductSnapshot>) -> Self {
        let mut unique: Vec<ProductSnapshot> = Vec::with_capacity(products.len());
        for product in products {
            if !unique.iter().any(|p| p.id == product.id) {
                unique.push(product);
            }
        }
        Self { products: unique }
    }

    /// Products in server order.
    #[must_use]
    pub fn products(&self) -> &[ProductSnapshot] {
        &self.products
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the wishlist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Linear membership test against the local mirror.
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.products.iter().any(|p| &p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Price;

    fn product(id: &str) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: id.to_uppercase(),
            price: Price::from_cents(500),
            image: None,
            shop_name: None,
        }
    }

    #[test]
    fn test_from_products_collapses_duplicates() {
        let wishlist = Wishlist::from_products(vec![product("a"), product("b"), product("a")]);
        assert_eq!(wishlist.len(), 2);
        assert_eq!(wishlist.products()[0].id, ProductId::new("a"));
    }

    #[test]
    fn test_contains() {
        let wishlist = Wishlist::from_products(vec![product("a")]);
        assert!(wishlist.contains(&ProductId::new("a")));
        assert!(!wishlist.contains(&ProductId::new("b")));
        assert!(!Wishlist::empty().contains(&ProductId::new("a")));
    }
}
