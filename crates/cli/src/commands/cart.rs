//! Cart commands. The cart is loaded before any of these run.

use bazaar_client::{AddToCart, ClientError, Storefront};
use bazaar_core::{Cart, CartItemId, ProductId, Quantity};

/// Print the cart.
pub fn show(storefront: &Storefront) {
    print_cart(&storefront.cart().cart());
}

/// Add a product.
#[allow(clippy::print_stdout)]
pub async fn add(
    storefront: &Storefront,
    product_id: &str,
    quantity: i64,
    size: Option<String>,
    color: Option<String>,
) -> Result<(), ClientError> {
    let options = AddToCart {
        quantity: Quantity::new(quantity)?,
        size,
        color,
    };
    let product_id = ProductId::new(product_id);
    let already_in_cart = storefront.cart().cart().contains_product(&product_id);
    let cart = storefront.cart().add(&product_id, options).await?;
    if already_in_cart {
        println!("{product_id} was already in the cart");
    }
    print_cart(&cart);
    Ok(())
}

/// Remove a line.
#[allow(clippy::print_stdout)]
pub async fn remove(storefront: &Storefront, item_id: &str) -> Result<(), ClientError> {
    let item_id = CartItemId::new(item_id);
    let Some(name) = storefront
        .cart()
        .cart()
        .item(&item_id)
        .map(|item| item.product.name.clone())
    else {
        println!("No cart line {item_id}");
        return Ok(());
    };
    let cart = storefront.cart().remove(&item_id).await?;
    println!("Removed {name}");
    print_cart(&cart);
    Ok(())
}

/// Change a line's quantity.
pub async fn set_quantity(storefront: &Storefront, item_id: &str, quantity: i64) -> Result<(), ClientError> {
    let cart = storefront
        .cart()
        .update_quantity(&CartItemId::new(item_id), quantity)
        .await?;
    print_cart(&cart);
    Ok(())
}

/// Empty the cart.
#[allow(clippy::print_stdout)]
pub async fn clear(storefront: &Storefront) -> Result<(), ClientError> {
    storefront.cart().clear().await?;
    println!("Cart is empty");
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_cart(cart: &Cart) {
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }
    for item in cart.items() {
        let mut variant = Vec::new();
        if let Some(size) = &item.size {
            variant.push(format!("size {size}"));
        }
        if let Some(color) = &item.color {
            variant.push(color.clone());
        }
        let variant = if variant.is_empty() {
            String::new()
        } else {
            format!(" [{}]", variant.join(", "))
        };
        println!(
            "{}  {} x{}{variant}  {}",
            item.id,
            item.product.name,
            item.quantity,
            item.line_total()
        );
    }
    println!("{} items, subtotal {}", cart.total_items(), cart.subtotal());
}
