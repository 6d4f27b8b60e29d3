//! Product snapshots referenced by cart lines, wishlist entries and
//! suggestions.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// The subset of a catalog product the client keeps alongside a cart line or
/// wishlist entry.
///
/// This is a snapshot: it reflects the product as the server returned it with
/// the last collection payload and is replaced, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Current unit price.
    pub price: Price,
    /// Primary image URL.
    pub image: Option<String>,
    /// Name of the shop selling the product.
    pub shop_name: Option<String>,
}
