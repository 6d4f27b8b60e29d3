//! Command implementations.
//!
//! Commands print results on stdout; logs go to stderr.

pub mod cart;
pub mod session;
pub mod shops;
pub mod suggest;
pub mod wishlist;

use bazaar_client::{Notice, NoticeLevel};
use bazaar_core::ProductSnapshot;

/// Print a notice raised while the command ran.
#[allow(clippy::print_stdout)]
pub fn print_notice(notice: &Notice) {
    let tag = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Info => "info",
        NoticeLevel::Error => "error",
    };
    println!("[{tag}] {}", notice.message);
}

/// One-line product summary.
pub fn product_line(product: &ProductSnapshot) -> String {
    match &product.shop_name {
        Some(shop) => format!("{}  {}  {} ({shop})", product.id, product.name, product.price),
        None => format!("{}  {}  {}", product.id, product.name, product.price),
    }
}

#[cfg(test)]
mod tests {
    use bazaar_core::{Price, ProductId};

    use super::*;

    #[test]
    fn test_product_line() {
        let mut product = ProductSnapshot {
            id: ProductId::new("p1"),
            name: "Mug".to_string(),
            price: Price::from_cents(800),
            image: None,
            shop_name: None,
        };
        assert_eq!(product_line(&product), "p1  Mug  $8.00");

        product.shop_name = Some("Clayworks".to_string());
        assert_eq!(product_line(&product), "p1  Mug  $8.00 (Clayworks)");
    }
}
