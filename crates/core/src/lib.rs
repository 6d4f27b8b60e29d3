//! Bazaar Core - Shared domain types for the marketplace client.
//!
//! This crate provides the types every Bazaar component speaks:
//! - `client` - Request pipeline, session and commerce synchronizers
//! - `cli` - Command-line front end over the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure derived values - no I/O, no
//! HTTP clients, no async. Wire formats live in the client crate and are
//! converted into these types at the request pipeline boundary.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, prices, quantities, products, carts, wishlists,
//!   shops and users

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
