//! Shop commands.

use bazaar_client::{ClientError, Storefront};
use bazaar_core::{Shop, ShopId};

/// Print one shop.
pub async fn show(storefront: &Storefront, shop_id: &str) -> Result<(), ClientError> {
    let shop = storefront.shops().shop(&ShopId::new(shop_id)).await?;
    print_shop(&shop);
    Ok(())
}

/// Print all shops.
pub async fn list(storefront: &Storefront) -> Result<(), ClientError> {
    for shop in storefront.shops().shops().await? {
        print_shop(&shop);
    }
    Ok(())
}

/// Follow or unfollow a shop.
#[allow(clippy::print_stdout)]
pub async fn follow(storefront: &Storefront, shop_id: &str) -> Result<(), ClientError> {
    match storefront.shops().toggle_follow(&ShopId::new(shop_id)).await? {
        Some(true) => println!("Following {shop_id}"),
        Some(false) => println!("No longer following {shop_id}"),
        None => println!("Follow toggled for {shop_id}"),
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_shop(shop: &Shop) {
    let marker = if shop.is_following { " (following)" } else { "" };
    println!("{}  {}  {} followers{marker}", shop.id, shop.name, shop.followers_count);
}
