//! Integration tests for the Bazaar client.
//!
//! Each test starts a `wiremock` server standing in for the marketplace
//! backend and drives a real [`Storefront`] over the `reqwest` transport.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `pipeline` - Headers, envelopes, retries, 401 teardown
//! - `commerce` - Cart, wishlist and follow flows end to end
//! - `session` - Sign-in persistence across restarts

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bazaar_client::notice::NoticeReceiver;
use bazaar_client::session::{FileStore, MemoryStore, SessionStore, keys};
use bazaar_client::{ClientConfig, ClientError, Notifier, RetryPolicy, Session, Storefront};
use serde_json::{Value, json};
use url::Url;
use wiremock::MockServer;

/// Path prefix every backend route lives under.
pub const API_PREFIX: &str = "/api";

/// Token the scripted backend issues.
pub const TEST_TOKEN: &str = "test-token-1";

/// A mock backend plus helpers for building clients against it.
pub struct TestBackend {
    pub server: MockServer,
}

impl TestBackend {
    /// Start a fresh mock server.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Backend base URL, including the `/api` prefix.
    ///
    /// # Panics
    ///
    /// Panics if the mock server URI is not a valid URL.
    #[must_use]
    pub fn api_url(&self) -> Url {
        Url::parse(&format!("{}{API_PREFIX}", self.server.uri())).expect("mock server uri")
    }

    /// Client configuration aimed at this backend with fast retries.
    ///
    /// # Panics
    ///
    /// Panics if the default configuration is invalid.
    #[must_use]
    pub fn config(&self, session_file: &Path) -> ClientConfig {
        let mut config = ClientConfig::from_lookup(|_| None).expect("default config");
        config.api_url = self.api_url();
        config.request_timeout = Duration::from_millis(500);
        config.session_file = session_file.to_path_buf();
        config.retry = RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(20),
        };
        config
    }

    /// Connect a storefront through the real session file and transport.
    ///
    /// # Errors
    ///
    /// Returns the connection error.
    pub async fn connect(&self, session_file: &Path) -> Result<(Storefront, NoticeReceiver), ClientError> {
        let (notifier, rx) = Notifier::channel();
        let storefront = Storefront::connect(self.config(session_file), notifier).await?;
        Ok((storefront, rx))
    }

    /// Build a storefront over an in-memory session.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn storefront(&self, session: Session) -> (Storefront, NoticeReceiver) {
        let (notifier, rx) = Notifier::channel();
        let config = self.config(Path::new("unused.json"));
        let transport = bazaar_client::http::ReqwestTransport::new(config.request_timeout)
            .expect("reqwest client");
        let storefront = Storefront::with_transport(config, session, Arc::new(transport), notifier);
        (storefront, rx)
    }
}

/// A signed-in session held in memory, and the store behind it.
///
/// # Panics
///
/// Panics if the in-memory store fails, which it never does.
pub async fn signed_in_session() -> (Session, Arc<MemoryStore>) {
    let user = json!({ "id": "u1", "name": "Ada", "email": "ada@example.com", "account_type": "customer" });
    let store = Arc::new(MemoryStore::with_entries(&[
        (keys::TOKEN, TEST_TOKEN),
        (keys::USER, &user.to_string()),
    ]));
    let session = Session::load(store.clone(), default_auth_routes())
        .await
        .expect("memory store");
    (session, store)
}

/// Whether a session file still holds a token.
///
/// # Panics
///
/// Panics if the file exists but cannot be read.
pub async fn persisted_token(path: &Path) -> Option<String> {
    FileStore::new(path).get(keys::TOKEN).await.expect("session file")
}

/// Success envelope around `data`.
#[must_use]
pub fn envelope(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

/// Failure envelope with `message`.
#[must_use]
pub fn error_envelope(message: &str) -> Value {
    json!({ "success": false, "message": message })
}

/// A product as the backend embeds it.
#[must_use]
pub fn product(id: &str, name: &str, price: u32) -> Value {
    json!({ "_id": id, "name": name, "price": price, "images": [format!("https://cdn.test/{id}.jpg")] })
}

/// A cart line as the backend returns it.
#[must_use]
pub fn cart_line(id: &str, product_id: &str, price: u32, quantity: u32) -> Value {
    json!({
        "_id": id,
        "product": product(product_id, &format!("Product {product_id}"), price),
        "quantity": quantity
    })
}

fn default_auth_routes() -> Vec<String> {
    bazaar_client::session::DEFAULT_AUTH_ROUTES
        .iter()
        .map(|r| (*r).to_string())
        .collect()
}
