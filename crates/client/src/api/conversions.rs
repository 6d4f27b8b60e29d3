//! Conversions from wire payloads to domain types.
//!
//! This is the validation step at the pipeline boundary: anything the domain
//! cannot represent is either coerced (documented per function) or rejected
//! with [`ClientError::Malformed`].

use bazaar_core::{
    AccountType, Cart, CartItem, CartItemId, Price, ProductId, ProductSnapshot, Quantity, Shop,
    ShopId, User, UserId, Wishlist,
};
use tracing::warn;

use super::{
    CartPayload, ProductsPayload, ShopPayload, ShopsPayload, UserPayload, WireCartItem, WireImage,
    WireProduct, WireShop, WireShopRef, WireUser, WishlistPayload,
};
use crate::error::ClientError;

fn malformed(what: impl Into<String>) -> ClientError {
    ClientError::Malformed(what.into())
}

// =============================================================================
// Products
// =============================================================================

/// Convert a product snapshot.
///
/// The image is `image` or else the first `images` entry; the shop name is
/// `shopName` or else a populated `shop.name`.
///
/// # Errors
///
/// Rejects products without an ID, name or price.
pub fn convert_product(product: WireProduct) -> Result<ProductSnapshot, ClientError> {
    let id = product
        .id
        .get()
        .ok_or_else(|| malformed("product without id"))?
        .to_string();
    let name = product
        .name
        .ok_or_else(|| malformed(format!("product {id} without name")))?;
    let price = product
        .price
        .ok_or_else(|| malformed(format!("product {id} without price")))?;
    if price.is_sign_negative() {
        return Err(malformed(format!("product {id} has negative price")));
    }

    let image = product
        .image
        .or_else(|| product.images.into_iter().next())
        .map(|img| match img {
            WireImage::Url(url) | WireImage::Object { url } => url,
        });

    let shop_name = product.shop_name.or(match product.shop {
        Some(WireShopRef::Populated { name }) => name,
        Some(WireShopRef::Id(_)) | None => None,
    });

    Ok(ProductSnapshot {
        id: ProductId::new(id),
        name,
        price: Price::new(price),
        image,
        shop_name,
    })
}

fn convert_products(products: Vec<WireProduct>) -> Result<Vec<ProductSnapshot>, ClientError> {
    products.into_iter().map(convert_product).collect()
}

/// Convert a product search payload.
///
/// # Errors
///
/// Rejects the payload if any product is malformed.
pub fn convert_product_list(payload: ProductsPayload) -> Result<Vec<ProductSnapshot>, ClientError> {
    match payload {
        ProductsPayload::Wrapped { products } | ProductsPayload::Bare(products) => {
            convert_products(products)
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

fn convert_cart_item(item: WireCartItem) -> Result<Option<CartItem>, ClientError> {
    let id = item
        .id
        .get()
        .ok_or_else(|| malformed("cart item without id"))?
        .to_string();

    let Some(product) = item.product else {
        warn!(item_id = %id, "Dropping cart line whose product no longer exists");
        return Ok(None);
    };

    let quantity = Quantity::new(item.quantity)
        .map_err(|e| malformed(format!("cart item {id}: {e}")))?;

    Ok(Some(CartItem {
        id: CartItemId::new(id),
        product: convert_product(product)?,
        quantity,
        size: item.size.filter(|s| !s.is_empty()),
        color: item.color.filter(|c| !c.is_empty()),
    }))
}

/// Convert a cart payload.
///
/// Lines whose product has been deleted (`product: null`) are dropped.
///
/// # Errors
///
/// Rejects the payload if any line lacks an ID, has a quantity below 1, or
/// embeds a malformed product.
pub fn convert_cart(payload: CartPayload) -> Result<Cart, ClientError> {
    let items = match payload {
        CartPayload::Wrapped { items } | CartPayload::Bare(items) => items,
    };

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        if let Some(line) = convert_cart_item(item)? {
            lines.push(line);
        }
    }
    Ok(Cart::from_items(lines))
}

// =============================================================================
// Wishlist
// =============================================================================

/// Convert a wishlist payload. Repeated product IDs are collapsed.
///
/// # Errors
///
/// Rejects the payload if any product is malformed.
pub fn convert_wishlist(payload: WishlistPayload) -> Result<Wishlist, ClientError> {
    let products = match payload {
        WishlistPayload::Wrapped { products } | WishlistPayload::Bare(products) => products,
    };
    convert_wishlist_products(products)
}

/// Convert the product array of a wishlist response.
///
/// # Errors
///
/// Rejects the payload if any product is malformed.
pub fn convert_wishlist_products(products: Vec<WireProduct>) -> Result<Wishlist, ClientError> {
    Ok(Wishlist::from_products(convert_products(products)?))
}

// =============================================================================
// Users
// =============================================================================

/// Convert a user profile. Unknown roles map to a customer account.
///
/// # Errors
///
/// Rejects profiles without an ID or name.
pub fn convert_user(user: WireUser) -> Result<User, ClientError> {
    let id = user
        .id
        .get()
        .ok_or_else(|| malformed("user without id"))?
        .to_string();
    let name = user
        .name
        .ok_or_else(|| malformed(format!("user {id} without name")))?;

    Ok(User {
        id: UserId::new(id),
        name,
        email: user.email,
        account_type: user
            .role
            .map(AccountType::from)
            .unwrap_or_default(),
        created_at: user.created_at,
    })
}

/// Convert a `GET /users/me` payload.
///
/// # Errors
///
/// See [`convert_user`].
pub fn convert_user_payload(payload: UserPayload) -> Result<User, ClientError> {
    match payload {
        UserPayload::Wrapped { user } | UserPayload::Bare(user) => convert_user(user),
    }
}

// =============================================================================
// Shops
// =============================================================================

/// Convert a shop.
///
/// The follower count is `followersCount` or else the length of
/// `followers`; a missing follow flag means "not following".
///
/// # Errors
///
/// Rejects shops without an ID or name.
pub fn convert_shop(shop: WireShop) -> Result<Shop, ClientError> {
    let id = shop
        .id
        .get()
        .ok_or_else(|| malformed("shop without id"))?
        .to_string();
    let name = shop
        .name
        .ok_or_else(|| malformed(format!("shop {id} without name")))?;

    Ok(Shop {
        id: ShopId::new(id),
        name,
        followers_count: shop
            .followers_count
            .or_else(|| shop.followers.as_ref().map(super::WireFollowers::count))
            .unwrap_or(0),
        is_following: shop.is_following.unwrap_or(false),
    })
}

/// Convert a single-shop payload.
///
/// # Errors
///
/// See [`convert_shop`].
pub fn convert_shop_payload(payload: ShopPayload) -> Result<Shop, ClientError> {
    match payload {
        ShopPayload::Wrapped { shop } | ShopPayload::Bare(shop) => convert_shop(shop),
    }
}

/// Convert a shop list payload.
///
/// # Errors
///
/// Rejects the payload if any shop is malformed.
pub fn convert_shop_list(payload: ShopsPayload) -> Result<Vec<Shop>, ClientError> {
    match payload {
        ShopsPayload::Wrapped { shops } | ShopsPayload::Bare(shops) => {
            shops.into_iter().map(convert_shop).collect()
        }
    }
}
