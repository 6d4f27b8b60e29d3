//! The storefront: every commerce component wired to one session.
//!
//! [`Storefront`] is what a front end holds. It owns the session, the
//! request pipeline, the cart and wishlist synchronizers, the shared query
//! cache and the suggestion box, and keeps them consistent across sign-in
//! and sign-out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bazaar_core::User;
use secrecy::SecretString;
use tracing::{info, instrument, warn};

use crate::cache::{CacheKey, CacheValue, QueryCache};
use crate::cart::CartSynchronizer;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{ReqwestTransport, Transport};
use crate::notice::Notifier;
use crate::pipeline::ApiClient;
use crate::session::{FileStore, Session, auth};
use crate::shops::ShopClient;
use crate::suggest::SuggestionQuery;
use crate::wishlist::WishlistSynchronizer;

/// Shared storefront state.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: ClientConfig,
    api: ApiClient,
    notifier: Notifier,
    cache: QueryCache,
    cache_epoch: AtomicU64,
    cart: CartSynchronizer,
    wishlist: WishlistSynchronizer,
    shops: ShopClient,
    suggestions: SuggestionQuery,
}

impl Storefront {
    /// Restore the persisted session and connect over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if the session file is unreadable, or
    /// [`ClientError::Transport`] if the HTTP client cannot be built.
    pub async fn connect(config: ClientConfig, notifier: Notifier) -> Result<Self, ClientError> {
        let store = Arc::new(FileStore::new(&config.session_file));
        let session = Session::load(store, config.auth_routes.clone()).await?;
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout)?);
        Ok(Self::with_transport(config, session, transport, notifier))
    }

    /// Assemble a storefront over an explicit session and transport.
    #[must_use]
    pub fn with_transport(
        config: ClientConfig,
        session: Session,
        transport: Arc<dyn Transport>,
        notifier: Notifier,
    ) -> Self {
        let epoch = session.epoch();
        let api = ApiClient::new(transport, config.api_url.clone(), session, config.retry);
        let cache = QueryCache::new();

        Self {
            inner: Arc::new(StorefrontInner {
                cart: CartSynchronizer::new(api.clone(), notifier.clone()),
                wishlist: WishlistSynchronizer::new(api.clone(), notifier.clone()),
                shops: ShopClient::new(api.clone(), cache.clone(), notifier.clone()),
                suggestions: SuggestionQuery::new(api.clone(), config.suggest),
                cache_epoch: AtomicU64::new(epoch),
                config,
                api,
                notifier,
                cache,
            }),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get a reference to the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the request pipeline.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// Get a reference to the session.
    #[must_use]
    pub fn session(&self) -> &Session {
        self.inner.api.session()
    }

    /// Get a reference to the notifier.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    /// Get a reference to the cart synchronizer.
    #[must_use]
    pub fn cart(&self) -> &CartSynchronizer {
        &self.inner.cart
    }

    /// Get a reference to the wishlist synchronizer.
    #[must_use]
    pub fn wishlist(&self) -> &WishlistSynchronizer {
        &self.inner.wishlist
    }

    /// Get a reference to the shop client.
    #[must_use]
    pub fn shops(&self) -> &ShopClient {
        self.sync_cache_epoch();
        &self.inner.shops
    }

    /// Get a reference to the suggestion query.
    #[must_use]
    pub fn suggestions(&self) -> &SuggestionQuery {
        &self.inner.suggestions
    }

    /// Get a reference to the query cache.
    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        self.sync_cache_epoch();
        &self.inner.cache
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load the cart and wishlist for the current session.
    ///
    /// Failures are logged; each synchronizer stays usable and can be
    /// reloaded.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        let (cart, wishlist) = tokio::join!(self.inner.cart.load(), self.inner.wishlist.load());
        if let Err(e) = cart {
            warn!(error = %e, "Cart unavailable at startup");
        }
        if let Err(e) = wishlist {
            warn!(error = %e, "Wishlist unavailable at startup");
        }
    }

    /// Sign in and load the new session's cart and wishlist.
    ///
    /// # Errors
    ///
    /// Returns the sign-in error after raising an error notice.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<User, ClientError> {
        let user = match auth::login(&self.inner.api, email, password).await {
            Ok(user) => user,
            Err(e) => {
                self.inner.notifier.error(e.user_message());
                return Err(e);
            }
        };
        self.signed_in(&user).await;
        self.inner.notifier.success(format!("Welcome back, {}", user.name));
        Ok(user)
    }

    /// Create an account, sign in and load its (empty) cart and wishlist.
    ///
    /// # Errors
    ///
    /// Returns the registration error after raising an error notice.
    #[instrument(skip_all)]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<User, ClientError> {
        let user = match auth::register(&self.inner.api, name, email, password).await {
            Ok(user) => user,
            Err(e) => {
                self.inner.notifier.error(e.user_message());
                return Err(e);
            }
        };
        self.signed_in(&user).await;
        self.inner.notifier.success(format!("Welcome, {}", user.name));
        Ok(user)
    }

    /// Sign out locally and discard every per-user view.
    ///
    /// Returns whether a session was held.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> bool {
        let had_session = auth::logout(&self.inner.api).await;
        self.inner.cart.reset();
        self.inner.wishlist.reset();
        self.inner.suggestions.dismiss();
        self.inner.cache.clear();
        self.inner
            .cache_epoch
            .store(self.session().epoch(), Ordering::SeqCst);

        if had_session {
            self.inner.notifier.info("You have been signed out");
        }
        had_session
    }

    /// The signed-in user's profile, refetched when the cached copy is
    /// missing or stale. `None` for guests.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error; a 401 ends the session.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<Option<User>, ClientError> {
        self.sync_cache_epoch();
        if !self.session().is_authenticated().await {
            return Ok(None);
        }

        if let Some(CacheValue::User(user)) = self.inner.cache.get_fresh(&CacheKey::CurrentUser).await {
            return Ok(Some(*user));
        }

        let user = auth::refresh_profile(&self.inner.api).await?;
        if let Some(user) = &user {
            self.inner
                .cache
                .insert(CacheKey::CurrentUser, CacheValue::User(Box::new(user.clone())))
                .await;
        }
        Ok(user)
    }

    async fn signed_in(&self, user: &User) {
        self.sync_cache_epoch();
        self.inner
            .cache
            .insert(CacheKey::CurrentUser, CacheValue::User(Box::new(user.clone())))
            .await;
        info!(user_id = %user.id, "Signed in");
        self.start().await;
    }

    /// Drop cached queries belonging to an earlier session, e.g. after the
    /// pipeline tore the session down on a 401.
    fn sync_cache_epoch(&self) {
        let epoch = self.session().epoch();
        if self.inner.cache_epoch.swap(epoch, Ordering::SeqCst) != epoch {
            self.inner.cache.clear();
        }
    }
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api", &self.inner.api)
            .field("session", self.session())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bazaar_core::ProductId;
    use reqwest::Method;
    use serde_json::json;
    use url::Url;

    use super::*;
    use crate::cart::AddToCart;
    use crate::http::fake::{FAKE_BASE_URL, FakeReply, FakeTransport};
    use crate::notice::{NoticeLevel, NoticeReceiver, drain};
    use crate::session::MemoryStore;
    use crate::sync::Phase;

    fn storefront() -> (FakeTransport, Storefront, NoticeReceiver) {
        let fake = FakeTransport::new();
        let mut config = ClientConfig::from_lookup(|_| None).unwrap();
        config.api_url = Url::parse(FAKE_BASE_URL).unwrap();
        let (notifier, rx) = Notifier::channel();
        let storefront = Storefront::with_transport(
            config,
            Session::new(Arc::new(MemoryStore::new())),
            Arc::new(fake.clone()),
            notifier,
        );
        (fake, storefront, rx)
    }

    fn script_signed_in_backend(fake: &FakeTransport) {
        fake.respond(
            Method::POST,
            "/auth/login",
            FakeReply::ok(json!({ "token": "tok", "user": { "_id": "u1", "name": "Ada" } })),
        );
        fake.respond(
            Method::GET,
            "/carts",
            FakeReply::ok(json!({ "items": [{
                "_id": "i1",
                "product": { "_id": "p1", "name": "Mug", "price": 8 },
                "quantity": 2
            }] })),
        );
        fake.respond(Method::GET, "/wishlist", FakeReply::ok(json!({ "products": [] })));
    }

    #[tokio::test]
    async fn test_login_loads_cart_and_wishlist() {
        let (fake, storefront, mut rx) = storefront();
        script_signed_in_backend(&fake);

        storefront.start().await;
        assert_eq!(storefront.cart().phase(), Phase::Ready);
        assert_eq!(fake.total_calls(), 0);

        let user = storefront
            .login("ada@example.com", &SecretString::from("pw"))
            .await
            .unwrap();
        assert_eq!(user.name, "Ada");
        assert_eq!(storefront.cart().total_items(), 2);
        assert_eq!(storefront.wishlist().phase(), Phase::Ready);

        // Profile is served from the cache populated at sign-in.
        assert_eq!(storefront.profile().await.unwrap().unwrap().name, "Ada");
        assert_eq!(fake.calls(&Method::GET, "/users/me"), 0);

        let notices = drain(&mut rx);
        assert_eq!(notices.last().unwrap().level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_logout_discards_per_user_state() {
        let (fake, storefront, _rx) = storefront();
        script_signed_in_backend(&fake);
        storefront
            .login("ada@example.com", &SecretString::from("pw"))
            .await
            .unwrap();

        assert!(storefront.logout().await);
        assert!(storefront.cart().items().is_empty());
        assert_eq!(storefront.cart().phase(), Phase::Uninitialized);
        assert!(storefront.cache().get(&CacheKey::CurrentUser).await.is_none());
        assert!(storefront.profile().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_clears_cache_and_blocks_mutations() {
        let (fake, storefront, mut rx) = storefront();
        script_signed_in_backend(&fake);
        fake.respond(Method::POST, "/carts/add", FakeReply::error(401, "jwt expired"));
        storefront
            .login("ada@example.com", &SecretString::from("pw"))
            .await
            .unwrap();
        let _ = drain(&mut rx);

        assert!(
            storefront
                .cart()
                .add(&ProductId::new("p1"), AddToCart::default())
                .await
                .is_err()
        );
        assert!(!storefront.session().is_authenticated().await);
        assert!(storefront.cart().items().is_empty());
        assert!(storefront.cache().get(&CacheKey::CurrentUser).await.is_none());

        // Next mutation is a local no-op.
        let calls = fake.total_calls();
        assert!(storefront.wishlist().toggle(&ProductId::new("p1")).await.unwrap().is_none());
        assert_eq!(fake.total_calls(), calls);
    }

    #[tokio::test]
    async fn test_failed_login_raises_notice() {
        let (fake, storefront, mut rx) = storefront();
        fake.respond(Method::POST, "/auth/login", FakeReply::error(401, "Invalid credentials"));

        assert!(
            storefront
                .login("ada@example.com", &SecretString::from("bad"))
                .await
                .is_err()
        );
        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, "Invalid credentials");
    }
}
