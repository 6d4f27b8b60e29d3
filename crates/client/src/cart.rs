//! Cart synchronizer.
//!
//! The server is the merge authority: adding a product/variant that is
//! already in the cart increments its quantity server-side, and the client
//! simply adopts the full item list every mutation returns. Nothing here
//! ever merges or patches local lines.

use bazaar_core::{Cart, CartItem, CartItemId, Price, ProductId, Quantity};
use serde::de::IgnoredAny;
use serde_json::{Map, Value, json};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::api::CartPayload;
use crate::api::conversions::convert_cart;
use crate::error::{ClientError, LOGIN_REQUIRED_MESSAGE};
use crate::notice::Notifier;
use crate::pipeline::{ApiClient, ApiRequest};
use crate::sync::{Mirror, Phase, Snapshot};

/// Observable cart state.
pub type CartSnapshot = Snapshot<Cart>;

/// Options for [`CartSynchronizer::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddToCart {
    /// Units to add (defaults to one).
    pub quantity: Quantity,
    /// Size variant.
    pub size: Option<String>,
    /// Color variant.
    pub color: Option<String>,
}

impl AddToCart {
    /// Add `quantity` units.
    #[must_use]
    pub fn quantity(quantity: Quantity) -> Self {
        Self {
            quantity,
            ..Self::default()
        }
    }

    /// Choose a size variant.
    #[must_use]
    pub fn size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Choose a color variant.
    #[must_use]
    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    fn body(&self, product_id: &ProductId) -> Value {
        let mut body = Map::new();
        body.insert("productId".to_string(), json!(product_id));
        body.insert("quantity".to_string(), json!(self.quantity.get()));
        if let Some(size) = &self.size {
            body.insert("size".to_string(), json!(size));
        }
        if let Some(color) = &self.color {
            body.insert("color".to_string(), json!(color));
        }
        Value::Object(body)
    }
}

/// Keeps the local cart in step with the server.
#[derive(Debug)]
pub struct CartSynchronizer {
    api: ApiClient,
    notifier: Notifier,
    mirror: Mirror<Cart>,
}

impl CartSynchronizer {
    /// Create a synchronizer; call [`load`](Self::load) to populate it.
    #[must_use]
    pub fn new(api: ApiClient, notifier: Notifier) -> Self {
        let mirror = Mirror::new(api.session().clone());
        Self {
            api,
            notifier,
            mirror,
        }
    }

    /// Fetch the cart. Without a session the cart is immediately an empty,
    /// ready guest cart and no request is made.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error; local state is left unchanged.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Cart, ClientError> {
        if !self.api.session().is_authenticated().await {
            self.mirror.set_ready(Cart::empty());
            return Ok(Cart::empty());
        }

        let ticket = self.mirror.begin();
        match self.fetch(ApiRequest::get("/carts")).await {
            Ok(cart) => {
                self.mirror.settle(ticket, Some(cart.clone()));
                Ok(cart)
            }
            Err(e) => {
                self.mirror.settle(ticket, None);
                warn!(error = %e, "Failed to load cart");
                Err(e)
            }
        }
    }

    /// Add a product and adopt the returned cart.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoSession`] without a session (no request is made);
    /// otherwise the pipeline error. Either way a notice is raised.
    #[instrument(skip(self, options), fields(quantity = %options.quantity))]
    pub async fn add(&self, product_id: &ProductId, options: AddToCart) -> Result<Cart, ClientError> {
        self.require_session().await?;

        let request = ApiRequest::post("/carts/add").json(options.body(product_id));
        let cart = self.mutate(request, true).await?;
        self.notifier.success("Added to cart");
        Ok(cart)
    }

    /// Remove one line. Failures are logged only.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoSession`] without a session; otherwise the pipeline
    /// error.
    #[instrument(skip(self))]
    pub async fn remove(&self, item_id: &CartItemId) -> Result<Cart, ClientError> {
        self.require_session().await?;

        let request = ApiRequest::delete(format!("/carts/item/{item_id}"));
        self.mutate(request, false).await
    }

    /// Set a line's quantity. Quantities below 1 are rejected locally.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoSession`] or [`ClientError::InvalidQuantity`] with no
    /// request made; otherwise the pipeline error. A notice is raised on
    /// every failure.
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, item_id: &CartItemId, quantity: i64) -> Result<Cart, ClientError> {
        self.require_session().await?;

        let quantity = match Quantity::new(quantity) {
            Ok(quantity) => quantity,
            Err(e) => {
                let err = ClientError::from(e);
                self.notifier.error(err.user_message());
                return Err(err);
            }
        };

        let request = ApiRequest::put(format!("/carts/item/{item_id}"))
            .json(json!({ "quantity": quantity.get() }));
        self.mutate(request, true).await
    }

    /// Empty the cart. Local state is cleared only once the server confirms.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoSession`] without a session; otherwise the pipeline
    /// error. A notice is raised on failure.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), ClientError> {
        self.require_session().await?;

        let ticket = self.mirror.begin();
        match self
            .api
            .dispatch::<IgnoredAny>(ApiRequest::delete("/carts/clear"))
            .await
        {
            Ok(_) => {
                self.mirror.settle(ticket, Some(Cart::empty()));
                info!("Cart cleared");
                Ok(())
            }
            Err(e) => {
                self.mirror.settle(ticket, None);
                self.notifier.error(e.user_message());
                Err(e)
            }
        }
    }

    /// Discard local state, e.g. on sign-out.
    pub fn reset(&self) {
        self.mirror.reset();
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The current cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.mirror.snapshot().value
    }

    /// Current lines.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.mirror.read(|cart| cart.items().to_vec())
    }

    /// Sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.mirror.read(Cart::subtotal)
    }

    /// Sum of quantities.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.mirror.read(Cart::total_items)
    }

    /// Load phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.mirror.phase()
    }

    /// Subscribe to cart changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.mirror.subscribe()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn require_session(&self) -> Result<(), ClientError> {
        if self.api.session().is_authenticated().await {
            Ok(())
        } else {
            self.notifier.info(LOGIN_REQUIRED_MESSAGE);
            Err(ClientError::NoSession)
        }
    }

    async fn fetch(&self, request: ApiRequest) -> Result<Cart, ClientError> {
        let payload: CartPayload = self.api.dispatch(request).await?;
        convert_cart(payload)
    }

    /// Send a mutation and adopt the returned cart on success.
    async fn mutate(&self, request: ApiRequest, notify_failure: bool) -> Result<Cart, ClientError> {
        let ticket = self.mirror.begin();
        match self.fetch(request).await {
            Ok(cart) => {
                self.mirror.settle(ticket, Some(cart.clone()));
                Ok(cart)
            }
            Err(e) => {
                self.mirror.settle(ticket, None);
                if notify_failure {
                    self.notifier.error(e.user_message());
                } else {
                    warn!(error = %e, "Cart mutation failed");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bazaar_core::{AccountType, User, UserId};
    use reqwest::Method;
    use secrecy::SecretString;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::http::fake::{FAKE_BASE_URL, FakeReply, FakeTransport};
    use crate::notice::{NoticeLevel, NoticeReceiver, drain};
    use crate::pipeline::RetryPolicy;
    use crate::session::{MemoryStore, Session};

    fn line(id: &str, product: &str, price: u32, quantity: u32) -> Value {
        json!({
            "_id": id,
            "product": { "_id": product, "name": format!("Product {product}"), "price": price },
            "quantity": quantity
        })
    }

    async fn setup(signed_in: bool) -> (FakeTransport, CartSynchronizer, NoticeReceiver) {
        let fake = FakeTransport::new();
        let session = Session::new(Arc::new(MemoryStore::new()));
        if signed_in {
            let user = User {
                id: UserId::new("u1"),
                name: "Ada".to_string(),
                email: None,
                account_type: AccountType::Customer,
                created_at: None,
            };
            session
                .establish(SecretString::from("tok"), user)
                .await
                .unwrap();
        }
        let api = ApiClient::new(
            Arc::new(fake.clone()),
            Url::parse(FAKE_BASE_URL).unwrap(),
            session,
            RetryPolicy::NONE,
        );
        let (notifier, rx) = Notifier::channel();
        (fake, CartSynchronizer::new(api, notifier), rx)
    }

    #[tokio::test]
    async fn test_guest_load_is_ready_and_empty() {
        let (fake, cart, _rx) = setup(false).await;
        assert_eq!(cart.phase(), Phase::Uninitialized);

        let loaded = cart.load().await.unwrap();
        assert!(loaded.is_empty());
        assert_eq!(cart.phase(), Phase::Ready);
        assert_eq!(fake.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_guest_mutations_make_no_calls() {
        let (fake, cart, mut rx) = setup(false).await;

        let err = cart
            .add(&ProductId::new("p1"), AddToCart::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NoSession));
        assert!(cart.remove(&CartItemId::new("i1")).await.is_err());
        assert!(cart.update_quantity(&CartItemId::new("i1"), 2).await.is_err());
        assert!(cart.clear().await.is_err());

        assert_eq!(fake.total_calls(), 0);
        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 4);
        assert!(notices.iter().all(|n| n.level == NoticeLevel::Info && n.message == LOGIN_REQUIRED_MESSAGE));
    }

    #[tokio::test]
    async fn test_load_computes_totals() {
        let (fake, cart, _rx) = setup(true).await;
        fake.respond(
            Method::GET,
            "/carts",
            FakeReply::ok(json!({ "items": [line("i1", "p1", 10, 2), line("i2", "p2", 5, 1)] })),
        );

        cart.load().await.unwrap();
        assert_eq!(cart.subtotal(), Price::from_cents(2500));
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_add_replaces_with_server_list() {
        let (fake, cart, mut rx) = setup(true).await;
        fake.respond(Method::GET, "/carts", FakeReply::ok(json!([line("i1", "p1", 10, 1)])));
        // The server merged the duplicate add into the existing line.
        fake.respond(Method::POST, "/carts/add", FakeReply::ok(json!([line("i1", "p1", 10, 2)])));
        cart.load().await.unwrap();

        cart.add(&ProductId::new("p1"), AddToCart::default().size("M"))
            .await
            .unwrap();

        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity.get(), 2);
        assert_eq!(cart.total_items(), 2);

        let body = fake.requests().last().unwrap().body.clone().unwrap();
        assert_eq!(body, json!({ "productId": "p1", "quantity": 1, "size": "M" }));

        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_server_list_is_adopted_verbatim() {
        let (fake, cart, _rx) = setup(true).await;
        fake.respond(Method::GET, "/carts", FakeReply::ok(json!([line("i1", "p1", 10, 2)])));
        // A local merge would give p1 x7; the server says x3 and also
        // reports a line this client never saw.
        fake.respond(
            Method::POST,
            "/carts/add",
            FakeReply::ok(json!([line("i1", "p1", 10, 3), line("i2", "p2", 5, 1)])),
        );
        fake.respond(Method::DELETE, "/carts/item/i1", FakeReply::ok(json!([line("i2", "p2", 5, 1)])));
        fake.respond(Method::DELETE, "/carts/clear", FakeReply::ok(json!(null)));
        cart.load().await.unwrap();

        let returned = cart
            .add(&ProductId::new("p1"), AddToCart::quantity(Quantity::new(5).unwrap()))
            .await
            .unwrap();
        assert_eq!(returned, cart.cart());

        let items = cart.items();
        let lines: Vec<_> = items
            .iter()
            .map(|item| (item.id.as_str(), item.product.id.as_str(), item.quantity.get()))
            .collect();
        assert_eq!(lines, vec![("i1", "p1", 3), ("i2", "p2", 1)]);
        assert_eq!(cart.subtotal(), Price::from_cents(3500));
        assert_eq!(cart.total_items(), 4);

        cart.remove(&CartItemId::new("i1")).await.unwrap();
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.subtotal(), Price::from_cents(500));

        cart.clear().await.unwrap();
        assert_eq!(cart.subtotal(), Price::from_cents(0));
        assert_eq!(cart.total_items(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_add_does_not_stick_in_loading() {
        let (fake, cart, _rx) = setup(true).await;
        fake.respond(Method::GET, "/carts", FakeReply::ok(json!([line("i1", "p1", 10, 1)])));
        fake.respond(
            Method::POST,
            "/carts/add",
            FakeReply::ok(json!([line("i1", "p1", 10, 2)])).after(Duration::from_secs(5)),
        );
        cart.load().await.unwrap();

        let product_id = ProductId::new("p1");
        let add = cart.add(&product_id, AddToCart::default());
        let outcome = tokio::time::timeout(Duration::from_secs(1), add).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(cart.phase(), Phase::Ready);
        assert_eq!(cart.total_items(), 1);
    }

    #[tokio::test]
    async fn test_add_failure_keeps_state_and_notifies() {
        let (fake, cart, mut rx) = setup(true).await;
        fake.respond(Method::GET, "/carts", FakeReply::ok(json!([line("i1", "p1", 10, 1)])));
        fake.respond(Method::POST, "/carts/add", FakeReply::error(400, "Out of stock"));
        cart.load().await.unwrap();
        let before = cart.cart();

        assert!(cart.add(&ProductId::new("p2"), AddToCart::default()).await.is_err());

        assert_eq!(cart.cart(), before);
        assert_eq!(cart.phase(), Phase::Ready);
        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(notices[0].message, "Out of stock");
    }

    #[tokio::test]
    async fn test_quantity_below_one_is_rejected_locally() {
        let (fake, cart, mut rx) = setup(true).await;
        fake.respond(Method::GET, "/carts", FakeReply::ok(json!([line("i1", "p1", 10, 1)])));
        cart.load().await.unwrap();

        let err = cart
            .update_quantity(&CartItemId::new("i1"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidQuantity(_)));
        assert_eq!(fake.calls(&Method::PUT, "/carts/item/i1"), 0);
        assert_eq!(cart.total_items(), 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_update_quantity_adopts_response() {
        let (fake, cart, _rx) = setup(true).await;
        fake.respond(Method::PUT, "/carts/item/i1", FakeReply::ok(json!([line("i1", "p1", 10, 4)])));

        cart.update_quantity(&CartItemId::new("i1"), 4).await.unwrap();
        assert_eq!(cart.subtotal(), Price::from_cents(4000));
        assert_eq!(fake.requests()[0].body, Some(json!({ "quantity": 4 })));
    }

    #[tokio::test]
    async fn test_remove_failure_is_silent() {
        let (fake, cart, mut rx) = setup(true).await;
        fake.respond(Method::GET, "/carts", FakeReply::ok(json!([line("i1", "p1", 10, 1)])));
        fake.respond(Method::DELETE, "/carts/item/i1", FakeReply::error(404, "Item not found"));
        cart.load().await.unwrap();

        assert!(cart.remove(&CartItemId::new("i1")).await.is_err());
        assert_eq!(cart.items().len(), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_clear_waits_for_confirmation() {
        let (fake, cart, _rx) = setup(true).await;
        fake.respond(Method::GET, "/carts", FakeReply::ok(json!([line("i1", "p1", 10, 1)])));
        fake.enqueue(Method::DELETE, "/carts/clear", FakeReply::error(500, "boom"));
        fake.respond(Method::DELETE, "/carts/clear", FakeReply::ok(json!(null)));
        cart.load().await.unwrap();

        assert!(cart.clear().await.is_err());
        assert_eq!(cart.items().len(), 1);

        cart.clear().await.unwrap();
        assert!(cart.items().is_empty());
        assert_eq!(cart.phase(), Phase::Ready);
    }

    #[tokio::test]
    async fn test_state_from_previous_session_is_hidden() {
        let (fake, cart, _rx) = setup(true).await;
        fake.respond(Method::GET, "/carts", FakeReply::ok(json!([line("i1", "p1", 10, 1)])));
        cart.load().await.unwrap();

        cart.api.session().teardown().await;
        assert!(cart.items().is_empty());
        assert_eq!(cart.phase(), Phase::Uninitialized);
    }
}
