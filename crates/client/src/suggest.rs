//! Debounced search-as-you-type suggestions.
//!
//! Each [`SuggestionQuery::input`] restarts the debounce window and bumps a
//! generation counter. Only the text present when the window elapses
//! uninterrupted is sent, and a response is published only if no newer input
//! arrived while it was in flight. In-flight requests are left to finish;
//! their results are simply dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bazaar_core::ProductSnapshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, debug_span, warn};

use crate::api::ProductsPayload;
use crate::api::conversions::convert_product_list;
use crate::error::ClientError;
use crate::pipeline::{ApiClient, ApiRequest};

/// Tuning for [`SuggestionQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestConfig {
    /// Inputs shorter than this (after trimming) never trigger a request.
    pub min_chars: usize,
    /// Quiet period after the last input before the request is sent.
    pub debounce: Duration,
    /// `limit` sent with each request.
    pub limit: usize,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            min_chars: 2,
            debounce: Duration::from_millis(300),
            limit: 8,
        }
    }
}

/// The published suggestion list and the query it answers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions {
    pub query: String,
    pub products: Vec<ProductSnapshot>,
}

/// Debounced product suggestions for a search box.
#[derive(Debug, Clone)]
pub struct SuggestionQuery {
    inner: Arc<SuggestInner>,
}

#[derive(Debug)]
struct SuggestInner {
    api: ApiClient,
    config: SuggestConfig,
    generation: AtomicU64,
    timer: Mutex<Option<JoinHandle<()>>>,
    results: watch::Sender<Suggestions>,
}

impl SuggestionQuery {
    /// Create an idle query.
    #[must_use]
    pub fn new(api: ApiClient, config: SuggestConfig) -> Self {
        let (results, _) = watch::channel(Suggestions::default());
        Self {
            inner: Arc::new(SuggestInner {
                api,
                config,
                generation: AtomicU64::new(0),
                timer: Mutex::new(None),
                results,
            }),
        }
    }

    /// Feed the current text of the search box.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn input(&self, text: &str) {
        let generation = self.supersede();
        let query = text.trim().to_string();

        if query.chars().count() < self.inner.config.min_chars {
            self.publish_empty();
            return;
        }

        let inner = Arc::clone(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(inner.config.debounce).await;
            if !inner.is_current(generation) {
                return;
            }
            // Detached from the timer so the next input can cancel the
            // window without aborting the request.
            let span = debug_span!("suggest", %query, generation);
            tokio::spawn(async move { inner.fetch(generation, query).await }.instrument(span));
        });

        *self.lock_timer() = Some(timer);
    }

    /// Close the suggestion list: cancel the pending window, supersede any
    /// in-flight request and empty the list.
    pub fn dismiss(&self) {
        self.supersede();
        self.publish_empty();
    }

    /// Same as [`dismiss`](Self::dismiss), for when the box is cleared.
    pub fn clear(&self) {
        self.dismiss();
    }

    /// The current suggestions.
    #[must_use]
    pub fn current(&self) -> Suggestions {
        self.inner.results.borrow().clone()
    }

    /// Subscribe to suggestion updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Suggestions> {
        self.inner.results.subscribe()
    }

    /// Bump the generation and cancel the pending window.
    fn supersede(&self) -> u64 {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(timer) = self.lock_timer().take() {
            timer.abort();
        }
        generation
    }

    fn publish_empty(&self) {
        self.inner.results.send_if_modified(|current| {
            if *current == Suggestions::default() {
                false
            } else {
                *current = Suggestions::default();
                true
            }
        });
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SuggestInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn fetch(&self, generation: u64, query: String) {
        let products = match self.request(&query).await {
            Ok(products) => products,
            Err(e) => {
                warn!(error = %e, "Suggestion request failed");
                return;
            }
        };

        // Checked under the channel lock so a concurrent dismiss wins.
        let count = products.len();
        let published = self.results.send_if_modified(|current| {
            if !self.is_current(generation) {
                return false;
            }
            *current = Suggestions { query, products };
            true
        });
        if published {
            debug!(count, "Publishing suggestions");
        } else {
            debug!("Discarding superseded suggestions");
        }
    }

    async fn request(&self, query: &str) -> Result<Vec<ProductSnapshot>, ClientError> {
        let payload: ProductsPayload = self
            .api
            .dispatch(
                ApiRequest::get("/products")
                    .query("q", query)
                    .query("limit", self.config.limit),
            )
            .await?;
        convert_product_list(payload)
    }
}

impl Drop for SuggestInner {
    fn drop(&mut self) {
        if let Some(timer) = self
            .timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            timer.abort();
        }
    }
}
