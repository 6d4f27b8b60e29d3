//! Wishlist commands. The wishlist is loaded before any of these run.

use bazaar_client::{ClientError, Storefront};
use bazaar_core::{ProductId, WishlistAction};

use super::product_line;

/// Print the wishlist.
#[allow(clippy::print_stdout)]
pub fn show(storefront: &Storefront) {
    let products = storefront.wishlist().products();
    if products.is_empty() {
        println!("Wishlist is empty");
        return;
    }
    for product in &products {
        println!("{}", product_line(product));
    }
}

/// Add or remove a product.
#[allow(clippy::print_stdout)]
pub async fn toggle(storefront: &Storefront, product_id: &str) -> Result<(), ClientError> {
    match storefront.wishlist().toggle(&ProductId::new(product_id)).await? {
        Some(WishlistAction::Added) => println!("{product_id} added ({} saved)", storefront.wishlist().len()),
        Some(WishlistAction::Removed) => {
            println!("{product_id} removed ({} saved)", storefront.wishlist().len());
        }
        None => {}
    }
    Ok(())
}

/// Remove a product.
#[allow(clippy::print_stdout)]
pub async fn remove(storefront: &Storefront, product_id: &str) -> Result<(), ClientError> {
    let wishlist = storefront.wishlist().remove(&ProductId::new(product_id)).await?;
    println!("{} saved", wishlist.len());
    Ok(())
}
