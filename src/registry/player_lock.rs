//! Player session lock (spec §5 "Player lock", shared-store key schema
//! `lock:player:<customSessionId>`). A player may hold at most one active
//! session lock, TTL'd at `player_lock.ttl_hours`. This is a plain KV value
//! (not a [`crate::kv::Locker`] lease) — the value itself *is* the winning
//! `sessionId`, matching spec §6's "`lock:player:<customSessionId>` →
//! sessionId (TTL 4 h)".
//!
//! Grounded on the same "single active session per identity" idiom as the
//! teacher's `Sessions` registry, generalised with the reconnect/transfer
//! rules spec §5 spells out: second connect with the same session renews
//! the TTL and returns the existing mapping; a new session only displaces
//! a stale one the caller has already determined is dead (no heartbeat).

use crate::kv::KvStore;
use crate::types::{CustomSessionId, SessionId};
use std::sync::Arc;
use std::time::Duration;

fn lock_key(custom_session_id: &CustomSessionId) -> String {
    format!("lock:player:{custom_session_id}")
}

/// Outcome of a connect attempt against a player's session lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// No prior lock, or the same session reconnecting: TTL renewed.
    Active(SessionId),
    /// A different, live session already holds the lock: new connection
    /// is rejected and the existing session is returned unchanged.
    Rejected(SessionId),
    /// The prior session was demonstrably dead; the lock was atomically
    /// rewritten to the new session.
    Transferred(SessionId),
}

impl ConnectOutcome {
    pub fn session_id(&self) -> &SessionId {
        match self {
            ConnectOutcome::Active(id) | ConnectOutcome::Rejected(id) | ConnectOutcome::Transferred(id) => id,
        }
    }
}

pub struct PlayerLockRegistry {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl PlayerLockRegistry {
    pub fn new(kv: Arc<dyn KvStore>, ttl_hours: u64) -> Self {
        PlayerLockRegistry {
            kv,
            ttl: Duration::from_secs(ttl_hours * 3600),
        }
    }

    /// `connect(customSessionId, sessionId, oldSessionIsAlive)` (spec §5).
    /// `old_session_is_alive` is supplied by the caller (the WS edge, which
    /// owns heartbeat tracking per spec §1) and is only consulted when a
    /// different session already holds the lock.
    pub async fn connect(
        &self,
        custom_session_id: &CustomSessionId,
        session_id: SessionId,
        old_session_is_alive: bool,
    ) -> ConnectOutcome {
        let key = lock_key(custom_session_id);

        if self.kv.set_if_absent(&key, &session_id, Some(self.ttl)).await {
            return ConnectOutcome::Active(session_id);
        }

        let existing = self.kv.get(&key).await.unwrap_or_default();
        if existing == session_id {
            self.kv.expire(&key, self.ttl).await;
            return ConnectOutcome::Active(session_id);
        }

        if !old_session_is_alive {
            return self.transfer(custom_session_id, &existing, session_id).await;
        }

        ConnectOutcome::Rejected(existing)
    }

    /// `transferPlayerLock(old, new)` (spec §5): atomically rewrites the
    /// lock value when the prior session is confirmed dead. Exposed
    /// separately so a caller that has already resolved liveness can
    /// invoke the rewrite directly without repeating `connect`'s read.
    pub async fn transfer(&self, custom_session_id: &CustomSessionId, _old: &SessionId, new: SessionId) -> ConnectOutcome {
        let key = lock_key(custom_session_id);
        self.kv.set(&key, &new, Some(self.ttl)).await;
        ConnectOutcome::Transferred(new)
    }

    pub async fn release(&self, custom_session_id: &CustomSessionId) {
        self.kv.delete(&lock_key(custom_session_id)).await;
    }

    pub async fn holder(&self, custom_session_id: &CustomSessionId) -> Option<SessionId> {
        self.kv.get(&lock_key(custom_session_id)).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kv::memory::MemoryKv;

    fn registry() -> PlayerLockRegistry {
        PlayerLockRegistry::new(Arc::new(MemoryKv::new()), 4)
    }

    #[tokio::test]
    async fn first_connect_acquires_the_lock() {
        let registry = registry();
        let outcome = registry.connect(&"player_a".to_string(), "s1".to_string(), true).await;
        assert_eq!(outcome, ConnectOutcome::Active("s1".to_string()));
    }

    #[tokio::test]
    async fn second_connect_with_same_session_renews() {
        let registry = registry();
        let key = "player_a".to_string();
        registry.connect(&key, "s1".to_string(), true).await;
        let outcome = registry.connect(&key, "s1".to_string(), true).await;
        assert_eq!(outcome, ConnectOutcome::Active("s1".to_string()));
    }

    #[tokio::test]
    async fn new_session_is_rejected_while_old_is_alive() {
        let registry = registry();
        let key = "player_a".to_string();
        registry.connect(&key, "s1".to_string(), true).await;
        let outcome = registry.connect(&key, "s2".to_string(), true).await;
        assert_eq!(outcome, ConnectOutcome::Rejected("s1".to_string()));
        assert_eq!(registry.holder(&key).await, Some("s1".to_string()));
    }

    #[tokio::test]
    async fn new_session_transfers_when_old_is_dead() {
        let registry = registry();
        let key = "player_a".to_string();
        registry.connect(&key, "s1".to_string(), true).await;
        let outcome = registry.connect(&key, "s2".to_string(), false).await;
        assert_eq!(outcome, ConnectOutcome::Transferred("s2".to_string()));
        assert_eq!(registry.holder(&key).await, Some("s2".to_string()));
    }
}
