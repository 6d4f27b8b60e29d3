//! Domain types for Bazaar.
//!
//! This module provides type-safe wrappers for marketplace concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod product;
pub mod shop;
pub mod status;
pub mod user;
pub mod wishlist;

pub use cart::{Cart, CartItem, Quantity, QuantityError};
pub use id::*;
pub use price::Price;
pub use product::ProductSnapshot;
pub use shop::Shop;
pub use status::*;
pub use user::User;
pub use wishlist::Wishlist;
