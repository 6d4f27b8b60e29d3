//! Query cache for server-owned reads.
//!
//! Entries are never evicted by invalidation; they are marked stale and
//! refetched on the next [`QueryCache::get_or_fetch`]. A stale entry stays
//! readable through [`QueryCache::get`] until the refetch replaces it.

use std::future::Future;
use std::time::Duration;

use bazaar_core::{Shop, ShopId, User};
use moka::future::Cache;
use tracing::debug;

use crate::error::ClientError;

const MAX_CAPACITY: u64 = 1000;
const TIME_TO_LIVE: Duration = Duration::from_secs(300);

/// Cache key for server reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Shop(ShopId),
    Shops,
    CurrentUser,
}

/// Cached value types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Shop(Box<Shop>),
    Shops(Vec<Shop>),
    User(Box<User>),
}

/// A cached value and whether it has been marked for refetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: CacheValue,
    pub stale: bool,
}

/// Shared query cache. Clones share storage.
#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<CacheKey, CacheEntry>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    /// Create a cache with a 5-minute TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(TIME_TO_LIVE)
    }

    /// Create a cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(MAX_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { inner }
    }

    /// The cached value, stale or not.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    /// The cached value, only if it has not been invalidated.
    pub async fn get_fresh(&self, key: &CacheKey) -> Option<CacheValue> {
        self.inner
            .get(key)
            .await
            .filter(|entry| !entry.stale)
            .map(|entry| entry.value)
    }

    /// Whether `key` is present but marked stale.
    pub async fn is_stale(&self, key: &CacheKey) -> bool {
        self.inner.get(key).await.is_some_and(|entry| entry.stale)
    }

    /// Store a fresh value.
    pub async fn insert(&self, key: CacheKey, value: CacheValue) {
        self.inner
            .insert(key, CacheEntry { value, stale: false })
            .await;
    }

    /// Modify a cached value in place. Returns whether `key` was present.
    pub async fn update(&self, key: &CacheKey, f: impl FnOnce(&mut CacheValue)) -> bool {
        let Some(mut entry) = self.inner.get(key).await else {
            return false;
        };
        f(&mut entry.value);
        self.inner.insert(key.clone(), entry).await;
        true
    }

    /// Mark `key` for refetch.
    pub async fn invalidate(&self, key: &CacheKey) {
        if let Some(mut entry) = self.inner.get(key).await
            && !entry.stale
        {
            entry.stale = true;
            self.inner.insert(key.clone(), entry).await;
            debug!(?key, "Cache entry marked stale");
        }
    }

    /// Drop `key` entirely.
    pub async fn remove(&self, key: &CacheKey) {
        self.inner.invalidate(key).await;
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Capture the exact state of `key`, including absence.
    pub async fn snapshot(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner.get(key).await
    }

    /// Put `key` back to a state captured by [`snapshot`](Self::snapshot).
    pub async fn restore(&self, key: CacheKey, entry: Option<CacheEntry>) {
        match entry {
            Some(entry) => self.inner.insert(key, entry).await,
            None => self.inner.invalidate(&key).await,
        }
    }

    /// Serve a fresh entry, or run `fetch` and cache its result.
    ///
    /// # Errors
    ///
    /// Returns whatever `fetch` returns; the cache is untouched on failure.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<CacheValue, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CacheValue, ClientError>>,
    {
        if let Some(value) = self.get_fresh(&key).await {
            debug!(?key, "Cache hit");
            return Ok(value);
        }
        debug!(?key, "Cache miss");
        let value = fetch().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop(followers: u64) -> CacheValue {
        CacheValue::Shop(Box::new(Shop {
            id: ShopId::new("s1"),
            name: "Loom & Co".to_string(),
            followers_count: followers,
            is_following: false,
        }))
    }

    fn key() -> CacheKey {
        CacheKey::Shop(ShopId::new("s1"))
    }

    #[tokio::test]
    async fn test_invalidate_marks_stale_but_keeps_value() {
        let cache = QueryCache::new();
        cache.insert(key(), shop(3)).await;

        cache.invalidate(&key()).await;
        assert!(cache.is_stale(&key()).await);
        assert_eq!(cache.get(&key()).await, Some(shop(3)));
        assert_eq!(cache.get_fresh(&key()).await, None);
    }

    #[tokio::test]
    async fn test_invalidate_absent_key_is_noop() {
        let cache = QueryCache::new();
        cache.invalidate(&CacheKey::Shops).await;
        assert!(cache.get(&CacheKey::Shops).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_restore_includes_absence() {
        let cache = QueryCache::new();
        let before = cache.snapshot(&key()).await;
        cache.insert(key(), shop(1)).await;

        cache.restore(key(), before).await;
        assert!(cache.get(&key()).await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_fetch_refetches_stale() {
        let cache = QueryCache::new();
        let value = cache
            .get_or_fetch(key(), || async { Ok(shop(1)) })
            .await
            .unwrap();
        assert_eq!(value, shop(1));

        // Fresh hit: fetch is not called.
        let value = cache
            .get_or_fetch(key(), || async { Err(ClientError::NoSession) })
            .await
            .unwrap();
        assert_eq!(value, shop(1));

        cache.invalidate(&key()).await;
        let value = cache
            .get_or_fetch(key(), || async { Ok(shop(2)) })
            .await
            .unwrap();
        assert_eq!(value, shop(2));
        assert!(!cache.is_stale(&key()).await);
    }

    #[tokio::test]
    async fn test_update_in_place() {
        let cache = QueryCache::new();
        assert!(!cache.update(&key(), |_| {}).await);

        cache.insert(key(), shop(1)).await;
        assert!(
            cache
                .update(&key(), |value| {
                    if let CacheValue::Shop(shop) = value {
                        shop.toggle_follow();
                    }
                })
                .await
        );
        let Some(CacheValue::Shop(shop)) = cache.get(&key()).await else {
            panic!("shop missing");
        };
        assert!(shop.is_following);
        assert_eq!(shop.followers_count, 2);
    }
}
