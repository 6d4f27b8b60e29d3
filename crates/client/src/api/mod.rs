//! Backend wire formats.
//!
//! Every response is wrapped in an [`Envelope`]. The `data` payload of each
//! endpoint is decoded into one of the explicit wire types below and then
//! converted into `bazaar_core` types by [`conversions`]. Wire types are
//! deliberately permissive (`id` or `_id`, bare array or wrapped object);
//! conversions are strict and reject payloads the domain cannot represent.

pub mod conversions;

use bazaar_core::WishlistAction;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// The response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Whether the server considers the call successful.
    #[serde(default)]
    pub success: bool,
    /// Endpoint-specific payload.
    #[serde(default)]
    pub data: Option<Value>,
    /// Human-readable failure (or success) message.
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// Shared pieces
// =============================================================================

/// Document identity as either `id` or `_id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireId {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "_id")]
    mongo_id: Option<String>,
}

impl WireId {
    /// The identifier, preferring `id` over `_id`.
    #[must_use]
    pub fn get(&self) -> Option<&str> {
        self.id
            .as_deref()
            .or(self.mongo_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// A product image as a bare URL or an object with a `url`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireImage {
    /// `"https://..."`
    Url(String),
    /// `{ "url": "https://..." }`
    Object {
        /// Image URL.
        url: String,
    },
}

/// The shop a product belongs to, populated or as a bare ID.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireShopRef {
    /// `{ "name": "...", ... }`
    Populated {
        /// Shop name.
        #[serde(default)]
        name: Option<String>,
    },
    /// Unpopulated reference.
    Id(String),
}

// =============================================================================
// Products, cart, wishlist
// =============================================================================

/// A product as embedded in cart lines, wishlists and search results.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProduct {
    /// Identity.
    #[serde(flatten)]
    pub id: WireId,
    /// Display name (`name` or `title`).
    #[serde(default, alias = "title")]
    pub name: Option<String>,
    /// Unit price.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Primary image.
    #[serde(default)]
    pub image: Option<WireImage>,
    /// Gallery.
    #[serde(default)]
    pub images: Vec<WireImage>,
    /// Flattened shop name.
    #[serde(default)]
    pub shop_name: Option<String>,
    /// Shop reference.
    #[serde(default)]
    pub shop: Option<WireShopRef>,
}

/// One cart line.
#[derive(Debug, Clone, Deserialize)]
pub struct WireCartItem {
    /// Line identity.
    #[serde(flatten)]
    pub id: WireId,
    /// Product, `null` when it has since been deleted.
    #[serde(default)]
    pub product: Option<WireProduct>,
    /// Units.
    pub quantity: i64,
    /// Size variant.
    #[serde(default)]
    pub size: Option<String>,
    /// Color variant.
    #[serde(default)]
    pub color: Option<String>,
}

/// Cart payload: `{ items: [...] }` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CartPayload {
    /// `{ "items": [...] }`
    Wrapped {
        /// Lines.
        items: Vec<WireCartItem>,
    },
    /// `[...]`
    Bare(Vec<WireCartItem>),
}

/// Wishlist payload: `{ products: [...] }` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WishlistPayload {
    /// `{ "products": [...] }`
    Wrapped {
        /// Products.
        products: Vec<WireProduct>,
    },
    /// `[...]`
    Bare(Vec<WireProduct>),
}

/// `POST /wishlist/toggle` payload.
#[derive(Debug, Deserialize)]
pub struct WishlistTogglePayload {
    /// The full list after the toggle.
    pub products: Vec<WireProduct>,
    /// Which way the toggle went.
    pub action: WishlistAction,
}

/// Product list payload for suggestions: bare array or `{ products }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProductsPayload {
    /// `{ "products": [...] }`
    Wrapped {
        /// Products.
        products: Vec<WireProduct>,
    },
    /// `[...]`
    Bare(Vec<WireProduct>),
}

// =============================================================================
// Users and auth
// =============================================================================

/// A user profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireUser {
    /// Identity.
    #[serde(flatten)]
    pub id: WireId,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Email.
    #[serde(default)]
    pub email: Option<String>,
    /// Account kind (`role`, `accountType` or `type`).
    #[serde(default, alias = "accountType", alias = "type")]
    pub role: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// `GET /users/me` payload: the user or `{ user }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum UserPayload {
    /// `{ "user": {...} }`
    Wrapped {
        /// Profile.
        user: WireUser,
    },
    /// `{...}`
    Bare(WireUser),
}

/// Login/register payload.
#[derive(Debug, Deserialize)]
pub struct AuthPayload {
    /// Issued bearer token.
    pub token: String,
    /// Signed-in profile.
    pub user: WireUser,
}

// =============================================================================
// Shops
// =============================================================================

/// Followers as a count or as the list of follower IDs.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireFollowers {
    /// A count.
    Count(u64),
    /// Follower references.
    List(Vec<Value>),
}

impl WireFollowers {
    /// Number of followers.
    #[must_use]
    pub fn count(&self) -> u64 {
        match self {
            Self::Count(n) => *n,
            Self::List(list) => list.len() as u64,
        }
    }
}

/// A shop.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireShop {
    /// Identity.
    #[serde(flatten)]
    pub id: WireId,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Explicit follower count.
    #[serde(default)]
    pub followers_count: Option<u64>,
    /// Follower list or count.
    #[serde(default)]
    pub followers: Option<WireFollowers>,
    /// Whether the current user follows the shop.
    #[serde(default)]
    pub is_following: Option<bool>,
}

/// Single shop payload: the shop or `{ shop }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ShopPayload {
    /// `{ "shop": {...} }`
    Wrapped {
        /// Shop.
        shop: WireShop,
    },
    /// `{...}`
    Bare(WireShop),
}

/// Shop list payload: bare array or `{ shops }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ShopsPayload {
    /// `{ "shops": [...] }`
    Wrapped {
        /// Shops.
        shops: Vec<WireShop>,
    },
    /// `[...]`
    Bare(Vec<WireShop>),
}

/// `POST /shops/:id/follow` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowPayload {
    /// Follow state after the toggle.
    #[serde(default, alias = "following")]
    pub is_following: Option<bool>,
    /// Follower count after the toggle.
    #[serde(default)]
    pub followers_count: Option<u64>,
}
