//! Bazaar Client - Commerce state and sync layer for the marketplace.
//!
//! Everything a front end needs to talk to the Bazaar backend: a request
//! pipeline with authentication, bounded retry and envelope decoding; a
//! session with persisted sign-in; replace-on-success cart and wishlist
//! mirrors; a query cache with optimistic mutations; and debounced search
//! suggestions.
//!
//! # Modules
//!
//! - [`pipeline`] - Single chokepoint for backend calls
//! - [`http`] - Transport seam (`reqwest` in production, scripted fake in tests)
//! - [`session`] - Token and profile state, persistence and the auth flow
//! - [`cart`], [`wishlist`] - Synchronizers over server-owned collections
//! - [`cache`], [`optimistic`], [`shops`] - Cached reads and optimistic writes
//! - [`suggest`] - Search-as-you-type
//! - [`storefront`] - All of the above wired to one session
//!
//! # Example
//!
//! ```no_run
//! use bazaar_client::{ClientConfig, Notifier, Storefront};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let (notifier, mut notices) = Notifier::channel();
//! let storefront = Storefront::connect(ClientConfig::from_env()?, notifier).await?;
//! storefront.start().await;
//!
//! println!("{} items in cart", storefront.cart().total_items());
//! for notice in bazaar_client::notice::drain(&mut notices) {
//!     println!("{}", notice.message);
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod cart;
pub mod config;
pub mod error;
pub mod http;
pub mod notice;
pub mod optimistic;
pub mod pipeline;
pub mod session;
pub mod shops;
pub mod storefront;
pub mod suggest;
pub mod sync;
pub mod wishlist;

pub use cache::{CacheKey, CacheValue, QueryCache};
pub use cart::{AddToCart, CartSnapshot, CartSynchronizer};
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, Result};
pub use notice::{Notice, NoticeLevel, Notifier};
pub use optimistic::OptimisticMutation;
pub use pipeline::{ApiClient, ApiRequest, RetryPolicy};
pub use session::{Session, SessionSnapshot};
pub use shops::ShopClient;
pub use storefront::Storefront;
pub use suggest::{SuggestConfig, SuggestionQuery, Suggestions};
pub use sync::Phase;
pub use wishlist::{WishlistSnapshot, WishlistSynchronizer};
