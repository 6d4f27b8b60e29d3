//! Shop reads and the follow toggle.

use bazaar_core::{Shop, ShopId};
use tracing::instrument;

use crate::api::conversions::{convert_shop_list, convert_shop_payload};
use crate::api::{FollowPayload, ShopPayload, ShopsPayload};
use crate::cache::{CacheKey, CacheValue, QueryCache};
use crate::error::{ClientError, LOGIN_REQUIRED_MESSAGE};
use crate::notice::Notifier;
use crate::optimistic::OptimisticMutation;
use crate::pipeline::{ApiClient, ApiRequest};

/// Cached shop queries.
#[derive(Debug, Clone)]
pub struct ShopClient {
    api: ApiClient,
    cache: QueryCache,
    notifier: Notifier,
}

impl ShopClient {
    /// Create a client sharing `cache` with the rest of the storefront.
    #[must_use]
    pub const fn new(api: ApiClient, cache: QueryCache, notifier: Notifier) -> Self {
        Self { api, cache, notifier }
    }

    /// One shop, served from the cache while fresh.
    ///
    /// # Errors
    ///
    /// Returns the pipeline or conversion error.
    #[instrument(skip(self), fields(shop_id = %id))]
    pub async fn shop(&self, id: &ShopId) -> Result<Shop, ClientError> {
        let value = self
            .cache
            .get_or_fetch(CacheKey::Shop(id.clone()), || async {
                let payload: ShopPayload = self.api.dispatch(ApiRequest::get(format!("/shops/{id}"))).await?;
                Ok(CacheValue::Shop(Box::new(convert_shop_payload(payload)?)))
            })
            .await?;

        match value {
            CacheValue::Shop(shop) => Ok(*shop),
            other => Err(ClientError::Malformed(format!("unexpected cached value {other:?}"))),
        }
    }

    /// All shops, served from the cache while fresh.
    ///
    /// # Errors
    ///
    /// Returns the pipeline or conversion error.
    #[instrument(skip(self))]
    pub async fn shops(&self) -> Result<Vec<Shop>, ClientError> {
        let value = self
            .cache
            .get_or_fetch(CacheKey::Shops, || async {
                let payload: ShopsPayload = self.api.dispatch(ApiRequest::get("/shops")).await?;
                Ok(CacheValue::Shops(convert_shop_list(payload)?))
            })
            .await?;

        match value {
            CacheValue::Shops(shops) => Ok(shops),
            other => Err(ClientError::Malformed(format!("unexpected cached value {other:?}"))),
        }
    }

    /// Follow or unfollow `id`.
    ///
    /// The cached shop and shop list flip immediately; on failure they are
    /// restored exactly and an error notice is raised. Either way the shop,
    /// the list and the current user are marked for refetch.
    ///
    /// Returns the follow state after the toggle, if known.
    ///
    /// # Errors
    ///
    /// [`ClientError::NoSession`] without a session (no request is made);
    /// otherwise the pipeline error.
    #[instrument(skip(self), fields(shop_id = %id))]
    pub async fn toggle_follow(&self, id: &ShopId) -> Result<Option<bool>, ClientError> {
        if !self.api.session().is_authenticated().await {
            self.notifier.info(LOGIN_REQUIRED_MESSAGE);
            return Err(ClientError::NoSession);
        }

        let target = id.clone();
        let payload = OptimisticMutation::new(&self.cache, &self.notifier)
            .snapshot(CacheKey::Shop(id.clone()))
            .snapshot(CacheKey::Shops)
            .invalidate(CacheKey::Shop(id.clone()))
            .invalidate(CacheKey::Shops)
            .invalidate(CacheKey::CurrentUser)
            .optimistic(move |_, value| match value {
                CacheValue::Shop(shop) if shop.id == target => shop.toggle_follow(),
                CacheValue::Shops(shops) => shops
                    .iter_mut()
                    .filter(|shop| shop.id == target)
                    .for_each(Shop::toggle_follow),
                _ => {}
            })
            .run(|| async {
                self.api
                    .dispatch::<Option<FollowPayload>>(ApiRequest::post(format!("/shops/{id}/follow")))
                    .await
            })
            .await?;

        if let Some(following) = payload.and_then(|p| p.is_following) {
            return Ok(Some(following));
        }
        Ok(match self.cache.get(&CacheKey::Shop(id.clone())).await {
            Some(CacheValue::Shop(shop)) => Some(shop.is_following),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

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

    async fn setup(signed_in: bool) -> (FakeTransport, ShopClient, NoticeReceiver) {
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
        (fake, ShopClient::new(api, QueryCache::new(), notifier), rx)
    }

    fn shop_reply(followers: u64, following: bool) -> FakeReply {
        FakeReply::ok(json!({
            "shop": { "_id": "s1", "name": "Loom & Co", "followersCount": followers, "isFollowing": following }
        }))
    }

    #[tokio::test]
    async fn test_shop_is_cached() {
        let (fake, shops, _rx) = setup(false).await;
        fake.respond(Method::GET, "/shops/s1", shop_reply(4, false));

        let id = ShopId::new("s1");
        assert_eq!(shops.shop(&id).await.unwrap().followers_count, 4);
        shops.shop(&id).await.unwrap();
        assert_eq!(fake.calls(&Method::GET, "/shops/s1"), 1);
    }

    #[tokio::test]
    async fn test_follow_failure_rolls_back() {
        let (fake, shops, mut rx) = setup(true).await;
        fake.respond(Method::GET, "/shops/s1", shop_reply(4, false));
        fake.respond(Method::POST, "/shops/s1/follow", FakeReply::error(400, "Cannot follow this shop"));
        fake.respond(
            Method::GET,
            "/shops",
            FakeReply::ok(json!([{ "_id": "s1", "name": "Loom & Co", "followersCount": 4 }])),
        );

        let id = ShopId::new("s1");
        shops.shop(&id).await.unwrap();
        shops.shops().await.unwrap();

        assert!(shops.toggle_follow(&id).await.is_err());

        let Some(CacheValue::Shop(cached)) = shops.cache.get(&CacheKey::Shop(id.clone())).await else {
            panic!("shop evicted");
        };
        assert_eq!(cached.followers_count, 4);
        assert!(!cached.is_following);
        let Some(CacheValue::Shops(list)) = shops.cache.get(&CacheKey::Shops).await else {
            panic!("shop list evicted");
        };
        assert_eq!(list[0].followers_count, 4);

        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(notices[0].message, "Cannot follow this shop");

        // Invalidated regardless: the next read refetches.
        shops.shop(&id).await.unwrap();
        assert_eq!(fake.calls(&Method::GET, "/shops/s1"), 2);
    }

    #[tokio::test]
    async fn test_follow_success_returns_server_state() {
        let (fake, shops, _rx) = setup(true).await;
        fake.respond(Method::GET, "/shops/s1", shop_reply(4, false));
        fake.respond(
            Method::POST,
            "/shops/s1/follow",
            FakeReply::ok(json!({ "isFollowing": true, "followersCount": 5 })),
        );

        let id = ShopId::new("s1");
        shops.shop(&id).await.unwrap();
        assert_eq!(shops.toggle_follow(&id).await.unwrap(), Some(true));
        assert!(shops.cache.is_stale(&CacheKey::Shop(id)).await);
    }

    #[tokio::test]
    async fn test_follow_without_session_makes_no_call() {
        let (fake, shops, mut rx) = setup(false).await;
        let err = shops.toggle_follow(&ShopId::new("s1")).await.unwrap_err();
        assert!(matches!(err, ClientError::NoSession));
        assert_eq!(fake.total_calls(), 0);
        assert_eq!(drain(&mut rx)[0].message, LOGIN_REQUIRED_MESSAGE);
    }
}
