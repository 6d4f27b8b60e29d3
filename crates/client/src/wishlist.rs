//! Wishlist synchronizer.

use bazaar_core::{ProductId, ProductSnapshot, Wishlist, WishlistAction};
use serde_json::json;
use tokio::sync::watch;
use tracing::{instrument, warn};

use crate::api::conversions::{convert_wishlist, convert_wishlist_products};
use crate::api::{WishlistPayload, WishlistTogglePayload};
use crate::error::{ClientError, LOGIN_REQUIRED_MESSAGE};
use crate::notice::Notifier;
use crate::pipeline::{ApiClient, ApiRequest};
use crate::sync::{Mirror, Phase, Snapshot};

/// Observable wishlist state.
pub type WishlistSnapshot = Snapshot<Wishlist>;

/// Keeps the local wishlist in step with the server.
#[derive(Debug)]
pub struct WishlistSynchronizer {
    api: ApiClient,
    notifier: Notifier,
    mirror: Mirror<Wishlist>,
}

impl WishlistSynchronizer {
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

    /// Fetch the wishlist; a guest gets an empty, ready list.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error; local state is left unchanged.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Wishlist, ClientError> {
        if !self.api.session().is_authenticated().await {
            self.mirror.set_ready(Wishlist::empty());
            return Ok(Wishlist::empty());
        }

        let ticket = self.mirror.begin();
        let result = async {
            let payload: WishlistPayload = self.api.dispatch(ApiRequest::get("/wishlist")).await?;
            convert_wishlist(payload)
        }
        .await;

        match result {
            Ok(wishlist) => {
                self.mirror.settle(ticket, Some(wishlist.clone()));
                Ok(wishlist)
            }
            Err(e) => {
                self.mirror.settle(ticket, None);
                warn!(error = %e, "Failed to load wishlist");
                Err(e)
            }
        }
    }

    /// Add or remove `product_id`; the server decides which.
    ///
    /// Returns `Ok(None)` when there is no session: no request is made and a
    /// login notice is raised.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error after raising an error notice; local state
    /// is left unchanged.
    #[instrument(skip(self))]
    pub async fn toggle(&self, product_id: &ProductId) -> Result<Option<WishlistAction>, ClientError> {
        if !self.api.session().is_authenticated().await {
            self.notifier.info(LOGIN_REQUIRED_MESSAGE);
            return Ok(None);
        }

        let ticket = self.mirror.begin();
        let result = async {
            let payload: WishlistTogglePayload = self
                .api
                .dispatch(ApiRequest::post("/wishlist/toggle").json(json!({ "productId": product_id })))
                .await?;
            Ok::<_, ClientError>((convert_wishlist_products(payload.products)?, payload.action))
        }
        .await;

        match result {
            Ok((wishlist, action)) => {
                self.mirror.settle(ticket, Some(wishlist));
                match action {
                    WishlistAction::Added => self.notifier.success("Added to wishlist"),
                    WishlistAction::Removed => self.notifier.info("Removed from wishlist"),
                }
                Ok(Some(action))
            }
            Err(e) => {
                self.mirror.settle(ticket, None);
                self.notifier.error(e.user_message());
                Err(e)
            }
        }
    }

    /// Remove `product_id`. Failures are logged only.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoSession`] without a session; otherwise the pipeline
    /// error.
    #[instrument(skip(self))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<Wishlist, ClientError> {
        if !self.api.session().is_authenticated().await {
            self.notifier.info(LOGIN_REQUIRED_MESSAGE);
            return Err(ClientError::NoSession);
        }

        let ticket = self.mirror.begin();
        let result = async {
            let payload: WishlistPayload = self
                .api
                .dispatch(ApiRequest::delete(format!("/wishlist/{product_id}")))
                .await?;
            convert_wishlist(payload)
        }
        .await;

        match result {
            Ok(wishlist) => {
                self.mirror.settle(ticket, Some(wishlist.clone()));
                Ok(wishlist)
            }
            Err(e) => {
                self.mirror.settle(ticket, None);
                warn!(error = %e, "Wishlist removal failed");
                Err(e)
            }
        }
    }

    /// Discard local state.
    pub fn reset(&self) {
        self.mirror.reset();
    }

    /// Whether `product_id` is in the local wishlist. No request is made.
    #[must_use]
    pub fn is_in_wishlist(&self, product_id: &ProductId) -> bool {
        self.mirror.read(|w| w.contains(product_id))
    }

    /// Current products.
    #[must_use]
    pub fn products(&self) -> Vec<ProductSnapshot> {
        self.mirror.read(|w| w.products().to_vec())
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mirror.read(Wishlist::len)
    }

    /// Whether the wishlist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.mirror.phase()
    }

    /// Subscribe to wishlist changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WishlistSnapshot> {
        self.mirror.subscribe()
    }
}
