//! Local mirrors of server-owned, per-user collections.
//!
//! A [`Mirror`] holds the last server-confirmed value of a collection and its
//! load [`Phase`]. It never merges: every successful response replaces the
//! value wholesale. Each request takes a [`Ticket`] carrying the session
//! epoch it was issued under; a response settling under a different epoch is
//! dropped, so state from one user's session never leaks into the next.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::session::Session;

/// Load phase of a mirrored collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nothing loaded for this session yet.
    #[default]
    Uninitialized,
    /// At least one request is outstanding.
    Loading,
    /// No request outstanding; the value is the last confirmed state.
    Ready,
}

/// Observable view of a mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    /// Load phase.
    pub phase: Phase,
    /// Last server-confirmed value.
    pub value: T,
    /// Session epoch the value belongs to.
    pub epoch: u64,
    pending: u32,
}

impl<T: Default> Snapshot<T> {
    fn fresh(epoch: u64) -> Self {
        Self {
            phase: Phase::Uninitialized,
            value: T::default(),
            epoch,
            pending: 0,
        }
    }
}

/// Proof that a request was started, tagged with its session epoch.
///
/// Dropping an unsettled ticket (the request future was cancelled) counts
/// as a settle without a value.
#[must_use = "dropping a ticket settles it without a value"]
pub struct Ticket<T> {
    epoch: u64,
    state: Arc<watch::Sender<Snapshot<T>>>,
    settled: bool,
}

impl<T> Drop for Ticket<T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let epoch = self.epoch;
        self.state.send_if_modified(|s| {
            if s.epoch != epoch || s.pending == 0 {
                return false;
            }
            debug!(epoch, "Request abandoned before it settled");
            s.pending -= 1;
            if s.pending == 0 {
                s.phase = Phase::Ready;
            }
            true
        });
    }
}

impl<T> std::fmt::Debug for Ticket<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket")
            .field("epoch", &self.epoch)
            .field("settled", &self.settled)
            .finish()
    }
}

/// Epoch-checked, replace-only local state.
pub struct Mirror<T> {
    session: Session,
    state: Arc<watch::Sender<Snapshot<T>>>,
}

impl<T> Mirror<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    /// Create an uninitialized mirror bound to `session`.
    #[must_use]
    pub fn new(session: Session) -> Self {
        let (state, _) = watch::channel(Snapshot::fresh(session.epoch()));
        Self {
            session,
            state: Arc::new(state),
        }
    }

    /// Mark a request as outstanding.
    ///
    /// State left over from an earlier session is discarded first.
    pub fn begin(&self) -> Ticket<T> {
        let epoch = self.session.epoch();
        self.state.send_modify(|s| {
            if s.epoch != epoch {
                *s = Snapshot::fresh(epoch);
            }
            s.pending += 1;
            s.phase = Phase::Loading;
        });
        Ticket {
            epoch,
            state: Arc::clone(&self.state),
            settled: false,
        }
    }

    /// Settle a request, replacing the value with `value` if given.
    ///
    /// Returns whether the value was applied. Responses for a previous
    /// session are dropped without touching state.
    pub fn settle(&self, mut ticket: Ticket<T>, value: Option<T>) -> bool {
        ticket.settled = true;
        let current = self.session.epoch();
        let mut applied = false;
        self.state.send_if_modified(|s| {
            if s.epoch != ticket.epoch || current != ticket.epoch {
                debug!(
                    ticket_epoch = ticket.epoch,
                    current_epoch = current,
                    "Dropping response from a previous session"
                );
                return false;
            }
            s.pending = s.pending.saturating_sub(1);
            if let Some(value) = value {
                s.value = value;
                applied = true;
            }
            if s.pending == 0 {
                s.phase = Phase::Ready;
            }
            true
        });
        applied
    }

    /// Enter `Ready` with `value` and no network involvement.
    pub fn set_ready(&self, value: T) {
        let epoch = self.session.epoch();
        self.state.send_modify(|s| {
            *s = Snapshot {
                phase: Phase::Ready,
                value,
                epoch,
                pending: 0,
            };
        });
    }

    /// Discard local state.
    pub fn reset(&self) {
        let epoch = self.session.epoch();
        self.state.send_replace(Snapshot::fresh(epoch));
    }

    /// Current snapshot; empty if it belongs to a previous session.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T> {
        let epoch = self.session.epoch();
        let state = self.state.borrow();
        if state.epoch == epoch {
            state.clone()
        } else {
            Snapshot::fresh(epoch)
        }
    }

    /// Read the current value without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let epoch = self.session.epoch();
        let state = self.state.borrow();
        if state.epoch == epoch {
            f(&state.value)
        } else {
            f(&T::default())
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.snapshot().phase
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.state.subscribe()
    }

    /// The session this mirror is bound to.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Mirror<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bazaar_core::{AccountType, User, UserId};
    use secrecy::SecretString;

    use super::*;
    use crate::session::MemoryStore;

    fn user() -> User {
        User {
            id: UserId::new("u1"),
            name: "Ada".to_string(),
            email: None,
            account_type: AccountType::Customer,
            created_at: None,
        }
    }

    #[test]
    fn test_phase_follows_outstanding_requests() {
        let mirror: Mirror<Vec<u32>> = Mirror::new(Session::new(Arc::new(MemoryStore::new())));
        assert_eq!(mirror.phase(), Phase::Uninitialized);

        let first = mirror.begin();
        let second = mirror.begin();
        assert_eq!(mirror.phase(), Phase::Loading);

        assert!(mirror.settle(first, Some(vec![1])));
        assert_eq!(mirror.phase(), Phase::Loading);

        assert!(!mirror.settle(second, None));
        assert_eq!(mirror.phase(), Phase::Ready);
        assert_eq!(mirror.snapshot().value, vec![1]);
    }

    #[test]
    fn test_last_response_wins() {
        let mirror: Mirror<Vec<u32>> = Mirror::new(Session::new(Arc::new(MemoryStore::new())));
        let a = mirror.begin();
        let b = mirror.begin();
        mirror.settle(b, Some(vec![2]));
        mirror.settle(a, Some(vec![1]));
        assert_eq!(mirror.snapshot().value, vec![1]);
    }

    #[tokio::test]
    async fn test_response_from_previous_session_is_dropped() {
        let session = Session::new(Arc::new(MemoryStore::new()));
        session
            .establish(SecretString::from("tok"), user())
            .await
            .unwrap();
        let mirror: Mirror<Vec<u32>> = Mirror::new(session.clone());
        mirror.set_ready(vec![7]);

        let ticket = mirror.begin();
        session.teardown().await;

        assert!(!mirror.settle(ticket, Some(vec![9])));
        assert!(mirror.snapshot().value.is_empty());
        assert_eq!(mirror.phase(), Phase::Uninitialized);
        assert_eq!(mirror.read(Vec::len), 0);
    }

    #[test]
    fn test_dropped_ticket_releases_loading() {
        let mirror: Mirror<Vec<u32>> = Mirror::new(Session::new(Arc::new(MemoryStore::new())));
        mirror.set_ready(vec![3]);

        let kept = mirror.begin();
        drop(mirror.begin());
        assert_eq!(mirror.phase(), Phase::Loading);

        assert!(mirror.settle(kept, Some(vec![4])));
        assert_eq!(mirror.phase(), Phase::Ready);
        assert_eq!(mirror.snapshot().value, vec![4]);
    }

    #[test]
    fn test_dropped_ticket_after_reset_leaves_state() {
        let mirror: Mirror<Vec<u32>> = Mirror::new(Session::new(Arc::new(MemoryStore::new())));
        let ticket = mirror.begin();
        mirror.reset();
        drop(ticket);
        assert_eq!(mirror.phase(), Phase::Uninitialized);
    }

    #[test]
    fn test_reset_discards_value() {
        let mirror: Mirror<Vec<u32>> = Mirror::new(Session::new(Arc::new(MemoryStore::new())));
        mirror.set_ready(vec![1, 2]);
        mirror.reset();
        assert_eq!(mirror.phase(), Phase::Uninitialized);
        assert!(mirror.snapshot().value.is_empty());
    }
}
