//! Shared KV & lock primitives (spec §4.1, component C1).
//!
//! Everything above this module — player/ownership registries, the queue,
//! acceptance, draft and game coordinators — is written against the
//! [`KvStore`], [`Locker`], [`Publisher`] and [`Subscriber`] driver
//! interfaces here rather than against any particular backing store, the
//! same way the teacher keeps its session/game stores behind a narrow
//! struct API instead of leaking storage details upward.

pub mod lock;
pub mod memory;
pub mod pubsub;

pub use lock::{LockHandle, Locker};
pub use pubsub::{Publisher, Subscriber};

use async_trait::async_trait;
use std::time::Duration;

/// Atomic primitives over a shared key-value store (spec §4.1).
///
/// Implementations must make every method atomic with respect to
/// concurrent callers across replicas; the in-memory [`memory::MemoryKv`]
/// achieves this with a single process-wide lock, a real deployment would
/// back this with Redis or an equivalent.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>);

    /// Sets `key` to `value` only if it is currently absent. Returns `true`
    /// if the set happened.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool;

    async fn delete(&self, key: &str) -> bool;

    /// Resets the TTL on an existing key without touching its value.
    async fn expire(&self, key: &str, ttl: Duration) -> bool;

    async fn incr(&self, key: &str, by: i64) -> i64;

    async fn decr(&self, key: &str, by: i64) -> i64 {
        self.incr(key, -by).await
    }

    /// Atomically adds `member` to the set at `key`. Returns `true` if the
    /// member was newly added.
    async fn add_to_set(&self, key: &str, member: &str) -> bool;

    async fn remove_from_set(&self, key: &str, member: &str) -> bool;

    async fn size_of_set(&self, key: &str) -> usize;

    async fn set_members(&self, key: &str) -> Vec<String>;

    /// Range query over a sorted set, ordered by score ascending.
    async fn scored_range(&self, key: &str, min: f64, max: f64) -> Vec<(String, f64)>;

    async fn add_to_sorted_set(&self, key: &str, member: &str, score: f64);

    async fn remove_from_sorted_set(&self, key: &str, member: &str);

    /// Atomically merges `fields` into the hash at `key` (never replaces
    /// the whole hash) — used for `pickBanData` merge semantics (spec
    /// §4.6 step 6).
    async fn hash_put_all(&self, key: &str, fields: Vec<(String, String)>);

    async fn hash_get(&self, key: &str, field: &str) -> Option<String>;

    async fn hash_get_all(&self, key: &str) -> Vec<(String, String)>;
}
