//! Session state: "am I authenticated, and as whom".
//!
//! A [`Session`] is created once per process and shared by `Arc` with every
//! component that builds requests. It is the only writer of the persisted
//! token/user record; the request pipeline reaches teardown through
//! [`Session::teardown`] when the server rejects the token.
//!
//! # Invariant
//!
//! The user profile is only meaningful while a token is present. Teardown
//! clears both under one write lock and one store call.
//!
//! # Epochs
//!
//! Every establish or teardown bumps the session epoch. Components that
//! mirror per-user server state tag it with the epoch it was loaded under,
//! so state (and late responses) from a previous session are never shown to
//! the next one.

pub mod auth;
pub mod store;

use std::sync::{Arc, Mutex, PoisonError};

use bazaar_core::User;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

pub use store::{FileStore, MemoryStore, SessionStore, StoreError, keys};

/// Default routes considered part of the authentication flow.
pub const DEFAULT_AUTH_ROUTES: &[&str] = &["/login", "/register", "/forgot-password", "/reset-password"];

/// What observers of the session see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Bumped on every establish and teardown.
    pub epoch: u64,
    /// Whether a token is held.
    pub authenticated: bool,
    /// Cached profile; `None` while unauthenticated or not yet fetched.
    pub user: Option<User>,
}

#[derive(Default)]
struct SessionState {
    token: Option<SecretString>,
    user: Option<User>,
}

/// Shared authentication state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: RwLock<SessionState>,
    store: Arc<dyn SessionStore>,
    status: watch::Sender<SessionSnapshot>,
    route: Mutex<String>,
    auth_routes: Vec<String>,
}

impl Session {
    /// Create a guest session backed by `store`, ignoring anything persisted.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_state(store, SessionState::default(), default_auth_routes())
    }

    /// Seed a session from the persisted record.
    ///
    /// A persisted user without a token is discarded (and removed from the
    /// store); an unreadable user record is dropped with a warning and
    /// refetched later.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    pub async fn load(
        store: Arc<dyn SessionStore>,
        auth_routes: Vec<String>,
    ) -> Result<Self, StoreError> {
        let token = store.get(keys::TOKEN).await?.filter(|t| !t.trim().is_empty());
        let raw_user = store.get(keys::USER).await?;

        let user = match (&token, raw_user) {
            (Some(_), Some(raw)) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable persisted user record");
                    None
                }
            },
            (None, Some(_)) => {
                debug!("Removing persisted user record without a token");
                store.remove_many(&[keys::USER]).await?;
                None
            }
            (_, None) => None,
        };

        let state = SessionState {
            token: token.map(SecretString::from),
            user,
        };

        Ok(Self::with_state(store, state, auth_routes))
    }

    fn with_state(store: Arc<dyn SessionStore>, state: SessionState, auth_routes: Vec<String>) -> Self {
        let snapshot = SessionSnapshot {
            epoch: 0,
            authenticated: state.token.is_some(),
            user: state.user.clone(),
        };
        let (status, _) = watch::channel(snapshot);

        Self {
            inner: Arc::new(SessionInner {
                state: RwLock::new(state),
                store,
                status,
                route: Mutex::new(String::from("/")),
                auth_routes,
            }),
        }
    }

    // =========================================================================
    // Readers
    // =========================================================================

    /// The bearer token, if a session is held.
    pub async fn token(&self) -> Option<SecretString> {
        self.inner.state.read().await.token.clone()
    }

    /// The cached user profile.
    pub async fn user(&self) -> Option<User> {
        self.inner.state.read().await.user.clone()
    }

    /// Whether a token is held.
    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.read().await.token.is_some()
    }

    /// Current epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.inner.status.borrow().epoch
    }

    /// Current observable state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.status.borrow().clone()
    }

    /// Subscribe to session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.status.subscribe()
    }

    // =========================================================================
    // Route tracking
    // =========================================================================

    /// Record the location the front end is currently showing.
    pub fn set_route(&self, path: impl Into<String>) {
        *self.inner.route.lock().unwrap_or_else(PoisonError::into_inner) = path.into();
    }

    /// The last recorded location.
    #[must_use]
    pub fn route(&self) -> String {
        self.inner
            .route
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the current location belongs to the authentication flow.
    #[must_use]
    pub fn in_auth_flow(&self) -> bool {
        let route = self.route();
        self.inner
            .auth_routes
            .iter()
            .any(|prefix| route == *prefix || route.starts_with(&format!("{prefix}/")))
    }

    // =========================================================================
    // Writers
    // =========================================================================

    /// Install a freshly issued token and profile, persisting both.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the record cannot be persisted; the
    /// in-memory session is still established.
    pub async fn establish(&self, token: SecretString, user: User) -> Result<(), StoreError> {
        let mut state = self.inner.state.write().await;

        let persisted = match serde_json::to_string(&user) {
            Ok(user_json) => {
                self.inner
                    .store
                    .set_many(&[
                        (keys::TOKEN, token.expose_secret().to_string()),
                        (keys::USER, user_json),
                    ])
                    .await
            }
            Err(source) => Err(StoreError::Corrupt {
                path: "user".into(),
                source,
            }),
        };

        state.token = Some(token);
        state.user = Some(user.clone());
        self.publish(true, Some(user), true);

        info!("Session established");
        persisted
    }

    /// Replace the cached profile after a refresh, if still signed in.
    ///
    /// Returns `false` (and writes nothing) when the session was torn down
    /// while the refresh was in flight.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the profile cannot be persisted.
    pub async fn update_user(&self, user: User) -> Result<bool, StoreError> {
        let mut state = self.inner.state.write().await;
        if state.token.is_none() {
            return Ok(false);
        }

        let user_json = serde_json::to_string(&user).map_err(|source| StoreError::Corrupt {
            path: "user".into(),
            source,
        })?;
        self.inner.store.set_many(&[(keys::USER, user_json)]).await?;

        state.user = Some(user.clone());
        self.publish(true, Some(user), false);
        Ok(true)
    }

    /// Clear the token and profile, in memory and in the store.
    ///
    /// Returns whether a session was held. Store failures are logged; the
    /// in-memory session is cleared regardless.
    pub async fn teardown(&self) -> bool {
        let mut state = self.inner.state.write().await;
        self.clear(&mut state).await
    }

    /// Tear down only if the session is still the one from `epoch`.
    ///
    /// Returns whether a session was torn down. A rejection for a token
    /// that has since been replaced leaves the newer session alone.
    pub async fn teardown_if_epoch(&self, epoch: u64) -> bool {
        let mut state = self.inner.state.write().await;
        if self.epoch() != epoch {
            debug!(
                request_epoch = epoch,
                current_epoch = self.epoch(),
                "Ignoring rejection for a previous session"
            );
            return false;
        }
        self.clear(&mut state).await
    }

    async fn clear(&self, state: &mut SessionState) -> bool {
        let had_session = state.token.is_some();

        state.token = None;
        state.user = None;

        if let Err(e) = self
            .inner
            .store
            .remove_many(&[keys::TOKEN, keys::USER])
            .await
        {
            warn!(error = %e, "Failed to clear persisted session");
        }

        if had_session {
            self.publish(false, None, true);
            info!("Session torn down");
        }
        had_session
    }

    fn publish(&self, authenticated: bool, user: Option<User>, new_epoch: bool) {
        self.inner.status.send_modify(|snapshot| {
            if new_epoch {
                snapshot.epoch += 1;
            }
            snapshot.authenticated = authenticated;
            snapshot.user = user;
        });
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("snapshot", &self.snapshot())
            .field("route", &self.route())
            .finish_non_exhaustive()
    }
}

fn default_auth_routes() -> Vec<String> {
    DEFAULT_AUTH_ROUTES.iter().map(|r| (*r).to_string()).collect()
}
