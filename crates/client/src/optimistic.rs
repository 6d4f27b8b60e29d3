//! Optimistic mutations against the [`QueryCache`].
//!
//! An [`OptimisticMutation`] runs one server mutation with an immediate local
//! effect:
//!
//! 1. snapshot every registered key (absent keys are snapshotted as absent);
//! 2. apply the optimistic write to the snapshotted entries and send the
//!    mutation;
//! 3. on failure, put every snapshotted key back exactly and raise an error
//!    notice;
//! 4. whatever the outcome, mark every invalidation key stale.
//!
//! After [`run`](OptimisticMutation::run) returns, each affected entry is
//! either rolled back or awaiting refetch, never a mix of the two.

use std::future::Future;

use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheValue, QueryCache};
use crate::error::ClientError;
use crate::notice::Notifier;

type ApplyFn<'a> = Box<dyn Fn(&CacheKey, &mut CacheValue) + Send + Sync + 'a>;

/// One optimistic write with guaranteed rollback and invalidation.
#[must_use = "an optimistic mutation does nothing until run"]
pub struct OptimisticMutation<'a> {
    cache: &'a QueryCache,
    notifier: &'a Notifier,
    snapshot_keys: Vec<CacheKey>,
    invalidate_keys: Vec<CacheKey>,
    apply: Option<ApplyFn<'a>>,
}

impl<'a> OptimisticMutation<'a> {
    /// Start a mutation against `cache`, reporting failures to `notifier`.
    pub const fn new(cache: &'a QueryCache, notifier: &'a Notifier) -> Self {
        Self {
            cache,
            notifier,
            snapshot_keys: Vec::new(),
            invalidate_keys: Vec::new(),
            apply: None,
        }
    }

    /// Snapshot `key` before the mutation and restore it on failure.
    pub fn snapshot(mut self, key: CacheKey) -> Self {
        if !self.snapshot_keys.contains(&key) {
            self.snapshot_keys.push(key);
        }
        self
    }

    /// Mark `key` stale once the mutation settles.
    pub fn invalidate(mut self, key: CacheKey) -> Self {
        if !self.invalidate_keys.contains(&key) {
            self.invalidate_keys.push(key);
        }
        self
    }

    /// The immediate local effect, applied to every snapshotted entry that
    /// is present.
    pub fn optimistic(mut self, apply: impl Fn(&CacheKey, &mut CacheValue) + Send + Sync + 'a) -> Self {
        self.apply = Some(Box::new(apply));
        self
    }

    /// Run `mutation` under the protocol.
    ///
    /// # Errors
    ///
    /// Returns the mutation's error after rolling back and notifying.
    pub async fn run<T, F, Fut>(self, mutation: F) -> Result<T, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut snapshots = Vec::with_capacity(self.snapshot_keys.len());
        for key in &self.snapshot_keys {
            snapshots.push((key.clone(), self.cache.snapshot(key).await));
        }

        if let Some(apply) = &self.apply {
            for key in &self.snapshot_keys {
                self.cache.update(key, |value| apply(key, value)).await;
            }
        }

        let result = mutation().await;

        if let Err(e) = &result {
            warn!(error = %e, keys = snapshots.len(), "Mutation failed; rolling back");
            for (key, entry) in snapshots {
                self.cache.restore(key, entry).await;
            }
            self.notifier.error(e.user_message());
        }

        for key in &self.invalidate_keys {
            self.cache.invalidate(key).await;
        }
        debug!(invalidated = self.invalidate_keys.len(), ok = result.is_ok(), "Mutation settled");

        result
    }
}
