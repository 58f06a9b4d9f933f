//! Distributed reentrant leased locks (spec §4.1, §4.9 "ordering").
//!
//! Grounded on the teacher's FIFO `QueueLock`
//! (`utils/lock.rs`): a ticket counter gates a semaphore so waiters are
//! served in arrival order. [`FairLock`] keeps that fairness but adds what
//! the spec requires and the teacher's lock did not: a lease with
//! renewal, reentrancy for the same owner, and fail-closed behaviour —
//! once a lease can no longer be confirmed, every handle derived from it
//! reports `is_held() == false`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::time::timeout;
use uuid::Uuid;

/// Generates a fresh, globally-unique owner token for one logical
/// operation's `try_lock` call (spec §4.1 "reentrancy per calling task").
/// A component name alone (e.g. `"draft-engine"`) is *not* a valid owner:
/// every task in that component would share it and the reentrancy grant
/// (`slot.owner == owner && !slot.is_free()`) would hand the same lock to
/// two unrelated concurrent operations. Call this once per operation
/// instance (not once per process, not cached in a `const`) and pass the
/// result as `owner`; a call that genuinely needs to reenter its own lock
/// within one operation reuses the same returned token.
pub fn new_owner(component: &str) -> String {
    format!("{component}-{}", Uuid::new_v4())
}

/// A held (or formerly held) lock lease. Fails closed: once the lease
/// expires without renewal, `is_held` reports `false` forever, even if
/// the caller never explicitly released it (spec §4.1: "if renewal cannot
/// be confirmed the handle's `isHeld()` reports false").
#[async_trait]
pub trait LockHandle: Send + Sync {
    fn is_held(&self) -> bool;

    /// Extends the lease by its original duration. Returns `false` (and
    /// marks the handle as not-held) if the lease already expired.
    async fn renew(&self) -> bool;

    async fn release(&self);
}

#[async_trait]
pub trait Locker: Send + Sync {
    /// Attempts to acquire `name`, waiting up to `wait` for contending
    /// holders to release. `owner` identifies *this call's* logical
    /// operation, not the calling component — callers must pass a token
    /// from [`new_owner`] (or one already held by the same in-flight
    /// operation) so that only a genuine nested acquire by the same
    /// operation reenters; two unrelated operations in the same component
    /// must never share an owner token or they could both be granted the
    /// lock at once.
    async fn try_lock(
        &self,
        name: &str,
        owner: &str,
        wait: Duration,
        lease: Duration,
    ) -> Option<Box<dyn LockHandle>>;
}

struct Slot {
    owner: Option<String>,
    expires_at: Option<Instant>,
    depth: u32,
    waiters: VecDeque<Arc<Notify>>,
}

impl Slot {
    fn new() -> Self {
        Slot {
            owner: None,
            expires_at: None,
            depth: 0,
            waiters: VecDeque::new(),
        }
    }

    fn is_free(&self, now: Instant) -> bool {
        self.owner.is_none() || self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}

/// In-memory fair leased lock table (one process == one "replica" for
/// the purposes of this simulation; a real deployment backs this with a
/// Redis RedLock-style primitive over the same `Locker` interface).
pub struct FairLock {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl FairLock {
    pub fn new() -> Self {
        FairLock {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for FairLock {
    fn default() -> Self {
        Self::new()
    }
}

struct FairLockHandle {
    name: String,
    owner: String,
    lease: Duration,
    held: Arc<AtomicBool>,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

#[async_trait]
impl LockHandle for FairLockHandle {
    fn is_held(&self) -> bool {
        if !self.held.load(Ordering::SeqCst) {
            return false;
        }
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&self.name) else {
            self.held.store(false, Ordering::SeqCst);
            return false;
        };
        if slot.owner.as_deref() != Some(self.owner.as_str())
            || slot.expires_at.map(|exp| exp <= Instant::now()).unwrap_or(true)
        {
            self.held.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }

    async fn renew(&self) -> bool {
        let mut slots = self.slots.lock();
        let Some(slot) = slots.get_mut(&self.name) else {
            self.held.store(false, Ordering::SeqCst);
            return false;
        };
        let now = Instant::now();
        if slot.owner.as_deref() != Some(self.owner.as_str())
            || slot.expires_at.map(|exp| exp <= now).unwrap_or(true)
        {
            self.held.store(false, Ordering::SeqCst);
            return false;
        }
        slot.expires_at = Some(now + self.lease);
        true
    }

    async fn release(&self) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(&self.name) {
            if slot.owner.as_deref() == Some(self.owner.as_str()) {
                slot.depth = slot.depth.saturating_sub(1);
                if slot.depth == 0 {
                    slot.owner = None;
                    slot.expires_at = None;
                    if let Some(waiter) = slot.waiters.pop_front() {
                        waiter.notify_one();
                    }
                }
            }
        }
        self.held.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Locker for FairLock {
    async fn try_lock(
        &self,
        name: &str,
        owner: &str,
        wait: Duration,
        lease: Duration,
    ) -> Option<Box<dyn LockHandle>> {
        let deadline = Instant::now() + wait;

        loop {
            let notify = {
                let mut slots = self.slots.lock();
                let slot = slots.entry(name.to_string()).or_insert_with(Slot::new);
                let now = Instant::now();

                // Reentrant: same owner already holds (or the slot is
                // stale/free) grants immediately.
                if slot.owner.as_deref() == Some(owner) && !slot.is_free(now) {
                    slot.depth += 1;
                    slot.expires_at = Some(now + lease);
                    return Some(Box::new(FairLockHandle {
                        name: name.to_string(),
                        owner: owner.to_string(),
                        lease,
                        held: Arc::new(AtomicBool::new(true)),
                        slots: self.slots.clone(),
                    }));
                }

                if slot.is_free(now) {
                    slot.owner = Some(owner.to_string());
                    slot.expires_at = Some(now + lease);
                    slot.depth = 1;
                    return Some(Box::new(FairLockHandle {
                        name: name.to_string(),
                        owner: owner.to_string(),
                        lease,
                        held: Arc::new(AtomicBool::new(true)),
                        slots: self.slots.clone(),
                    }));
                }

                let notify = Arc::new(Notify::new());
                slot.waiters.push_back(notify.clone());
                notify
            };

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            if timeout(deadline - now, notify.notified()).await.is_err() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn reentrant_for_same_owner() {
        let lock = FairLock::new();
        let h1 = lock
            .try_lock("lock:draft:1", "owner-a", Duration::from_millis(50), Duration::from_secs(5))
            .await
            .unwrap();
        let h2 = lock
            .try_lock("lock:draft:1", "owner-a", Duration::from_millis(50), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(h1.is_held());
        assert!(h2.is_held());
    }

    #[tokio::test]
    async fn contended_by_other_owner_times_out() {
        let lock = FairLock::new();
        let _h1 = lock
            .try_lock("lock:draft:1", "owner-a", Duration::from_millis(50), Duration::from_secs(5))
            .await
            .unwrap();
        let attempt = lock
            .try_lock("lock:draft:1", "owner-b", Duration::from_millis(50), Duration::from_secs(5))
            .await;
        assert!(attempt.is_none());
    }

    #[tokio::test]
    async fn release_unblocks_waiter() {
        let lock = Arc::new(FairLock::new());
        let h1 = lock
            .try_lock("lock:draft:1", "owner-a", Duration::from_millis(50), Duration::from_secs(5))
            .await
            .unwrap();

        let lock2 = lock.clone();
        let waiter = tokio::spawn(async move {
            lock2
                .try_lock("lock:draft:1", "owner-b", Duration::from_secs(2), Duration::from_secs(5))
                .await
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        h1.release().await;
        let result = waiter.await.unwrap();
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn lease_expiry_fails_closed() {
        let lock = FairLock::new();
        let h1 = lock
            .try_lock("lock:game:finish:1", "owner-a", Duration::from_millis(50), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!h1.is_held());
        assert!(!h1.renew().await);
    }
}
