//! SessionStore: the registry of open album menus.
//!
//! Holds at most one [`Session`] per user. Opening a new menu atomically
//! replaces the previous one; replaced and expired sessions are retired by
//! broadcasting [`BotEvent::ControlsStripped`] for their message.
//!
//! Expiry timers are plain `tokio::spawn`ed sleeps. A timer only removes the
//! session whose token it was started for, so a stale timer can never retire
//! a newer session.

use super::{Session, SessionInfo};
use crate::catalog::{CategoryCount, CollectionItem};
use crate::events::BotEvent;
use crate::interaction::{MessageHandle, UserId};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why a session left the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireReason {
    /// The owner opened a new album menu
    Replaced,
    /// No interaction within the inactivity window
    Expired,
    /// The process is shutting down
    Shutdown,
}

struct StoreInner {
    sessions: DashMap<UserId, Session>,
    timeout: Duration,
    page_size: usize,
    event_tx: broadcast::Sender<BotEvent>,
}

/// Process-wide registry of album sessions
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    pub fn new(timeout: Duration, page_size: usize, event_tx: broadcast::Sender<BotEvent>) -> Self {
        SessionStore {
            inner: Arc::new(StoreInner {
                sessions: DashMap::new(),
                timeout,
                page_size,
                event_tx,
            }),
        }
    }

    /// Register a fresh session for `owner`, retiring any session it replaces.
    ///
    /// Must be called from within a tokio runtime (starts the expiry timer).
    pub fn open(
        &self,
        owner: UserId,
        items: Vec<CollectionItem>,
        categories: Vec<CategoryCount>,
        message: MessageHandle,
    ) -> SessionInfo {
        let session = Session::new(owner.clone(), items, categories, message, self.inner.page_size);
        let info = session.info();

        // Insert-or-replace is atomic per key; two racing opens each retire
        // whatever they displaced and exactly one session survives.
        if let Some(previous) = self.inner.sessions.insert(owner.clone(), session) {
            self.inner.retire_session(previous, RetireReason::Replaced);
        }
        self.inner.schedule_expiry(&owner, info.token);

        tracing::debug!("Opened album session {} for {}", info.token, owner);
        info
    }

    /// Look up the owner's session
    pub fn get(&self, owner: &UserId) -> Option<SessionInfo> {
        self.inner.sessions.get(owner).map(|session| session.info())
    }

    /// Run `f` on the owner's session if it is still the one `token` names.
    ///
    /// `f` runs under the map's shard lock; it must not block or await.
    pub fn with_session<R>(
        &self,
        owner: &UserId,
        token: Uuid,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        let mut session = self.inner.sessions.get_mut(owner)?;
        if session.token() != token {
            return None;
        }
        Some(f(&mut *session))
    }

    /// Remove the owner's session and strip its controls. Never fails.
    pub fn retire(&self, owner: &UserId, reason: RetireReason) -> bool {
        match self.inner.sessions.remove(owner) {
            Some((_, session)) => {
                self.inner.retire_session(session, reason);
                true
            }
            None => false,
        }
    }

    /// Restart the inactivity window of the session `token` names.
    ///
    /// Returns false, doing nothing, when that session is gone or replaced.
    pub fn touch(&self, owner: &UserId, token: Uuid) -> bool {
        self.inner.schedule_expiry(owner, token)
    }

    /// Retire every session (process shutdown)
    pub fn clear(&self) -> usize {
        let owners: Vec<UserId> = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut retired = 0;
        for owner in owners {
            if let Some((_, session)) = self.inner.sessions.remove(&owner) {
                self.inner.retire_session(session, RetireReason::Shutdown);
                retired += 1;
            }
        }
        if retired > 0 {
            tracing::info!("Retired {} album sessions on shutdown", retired);
        }
        retired
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }
}

impl StoreInner {
    fn schedule_expiry(self: &Arc<Self>, owner: &UserId, token: Uuid) -> bool {
        let Some(mut session) = self.sessions.get_mut(owner) else {
            return false;
        };
        if session.token() != token {
            return false;
        }

        let weak: Weak<StoreInner> = Arc::downgrade(self);
        let timer_owner = owner.clone();
        let deadline = tokio::time::Instant::now() + self.timeout;
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(&timer_owner, token);
            }
        });
        session.set_expiry(handle.abort_handle(), deadline);
        true
    }

    fn expire(&self, owner: &UserId, token: Uuid) {
        if let Some((_, session)) = self
            .sessions
            .remove_if(owner, |_, session| {
                session.token() == token && session.is_due(tokio::time::Instant::now())
            })
        {
            tracing::debug!("Album session {} for {} expired", token, owner);
            self.retire_session(session, RetireReason::Expired);
        }
    }

    fn retire_session(&self, mut session: Session, reason: RetireReason) {
        session.cancel_expiry();
        let event = BotEvent::ControlsStripped {
            owner: session.owner().clone(),
            message: session.message().clone(),
            reason,
        };

        // Nobody listening means the message cannot be edited; the session is gone either way
        if let Err(e) = self.event_tx.send(event) {
            tracing::warn!(
                "Could not strip controls for {} (session {}, {:?}): {}",
                session.owner(),
                session.token(),
                reason,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{handle, item};
    use crate::session::Direction;

    fn store(timeout_secs: u64) -> (SessionStore, broadcast::Receiver<BotEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (SessionStore::new(Duration::from_secs(timeout_secs), 5, tx), rx)
    }

    fn items(n: i64) -> Vec<CollectionItem> {
        (1..=n).map(|id| item(id, "Comun")).collect()
    }

    #[tokio::test]
    async fn test_open_twice_keeps_one_and_strips_first() {
        let (store, mut rx) = store(60);
        let owner = UserId::new("1");

        let first = store.open(owner.clone(), items(3), vec![], handle("a"));
        let second = store.open(owner.clone(), items(3), vec![], handle("b"));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&owner).unwrap().token, second.token);
        assert_ne!(first.token, second.token);

        let event = rx.try_recv().unwrap();
        assert_eq!(
            event,
            BotEvent::ControlsStripped {
                owner: owner.clone(),
                message: handle("a"),
                reason: RetireReason::Replaced,
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_token_cannot_mutate() {
        let (store, _rx) = store(60);
        let owner = UserId::new("1");
        let first = store.open(owner.clone(), items(12), vec![], handle("a"));
        let second = store.open(owner.clone(), items(12), vec![], handle("b"));

        let moved = store.with_session(&owner, first.token, |s| s.navigate(Direction::Next));
        assert!(moved.is_none());
        assert!(!store.touch(&owner, first.token));
        assert_eq!(store.get(&owner).unwrap().page, 1);

        store.with_session(&owner, second.token, |s| s.navigate(Direction::Next));
        assert_eq!(store.get(&owner).unwrap().page, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_expires_after_timeout() {
        let (store, mut rx) = store(60);
        let owner = UserId::new("1");
        store.open(owner.clone(), items(3), vec![], handle("a"));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(store.get(&owner).is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.get(&owner).is_none());
        assert!(matches!(
            rx.try_recv().unwrap(),
            BotEvent::ControlsStripped { reason: RetireReason::Expired, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_extends_expiry() {
        let (store, _rx) = store(60);
        let owner = UserId::new("1");
        let info = store.open(owner.clone(), items(12), vec![], handle("a"));

        tokio::time::sleep(Duration::from_secs(59)).await;
        store.with_session(&owner, info.token, |s| s.navigate(Direction::Next));
        assert!(store.touch(&owner, info.token));

        // t = 61s: the original deadline has passed
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.get(&owner).is_some());

        // t = 118s: still inside the renewed window
        tokio::time::sleep(Duration::from_secs(57)).await;
        assert!(store.get(&owner).is_some());

        // t = 120s: past 59 + 60
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.get(&owner).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_timer_does_not_retire_new_session() {
        let (store, _rx) = store(60);
        let owner = UserId::new("1");
        store.open(owner.clone(), items(3), vec![], handle("a"));

        tokio::time::sleep(Duration::from_secs(30)).await;
        let second = store.open(owner.clone(), items(3), vec![], handle("b"));

        // First session's deadline (t = 60s) passes
        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(store.get(&owner).unwrap().token, second.token);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(store.get(&owner).is_none());
    }

    #[tokio::test]
    async fn test_touch_after_retire_is_noop() {
        let (store, _rx) = store(60);
        let owner = UserId::new("1");
        let info = store.open(owner.clone(), items(3), vec![], handle("a"));

        assert!(store.retire(&owner, RetireReason::Expired));
        assert!(!store.retire(&owner, RetireReason::Expired));
        assert!(!store.touch(&owner, info.token));
        assert!(store.get(&owner).is_none());
    }

    #[tokio::test]
    async fn test_retire_without_listener_still_removes() {
        let (store, rx) = store(60);
        drop(rx);
        let owner = UserId::new("1");
        store.open(owner.clone(), items(3), vec![], handle("a"));
        store.open(owner.clone(), items(3), vec![], handle("b"));

        assert_eq!(store.len(), 1);
        assert!(store.retire(&owner, RetireReason::Expired));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_clear_retires_everyone() {
        let (store, mut rx) = store(60);
        for id in ["1", "2", "3"] {
            store.open(UserId::new(id), items(1), vec![], handle(id));
        }

        assert_eq!(store.clear(), 3);
        assert!(store.is_empty());
        for _ in 0..3 {
            assert!(matches!(
                rx.try_recv().unwrap(),
                BotEvent::ControlsStripped { reason: RetireReason::Shutdown, .. }
            ));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_leave_one_session() {
        let (store, _rx) = store(60);
        let owner = UserId::new("1");

        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            let owner = owner.clone();
            tasks.push(tokio::spawn(async move {
                store.open(owner, items(2), vec![], handle(&i.to_string()))
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.len(), 1);
        let info = store.get(&owner).unwrap();
        assert!(store.touch(&owner, info.token));
    }
}
