//! In-memory [`KvStore`] implementation, grounded on the same
//! `RwLock<IntHashMap<_>>` pattern the teacher uses for `Games`/`Sessions`
//! (`services/game/store.rs`, `services/sessions.rs`). A production
//! deployment swaps this for a Redis-backed implementation of the same
//! trait; nothing above this module needs to change.

use super::KvStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}

#[derive(Default)]
struct Collections {
    sets: HashMap<String, HashSet<String>>,
    sorted_sets: HashMap<String, BTreeMap<String, f64>>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// Single process-wide table backing every key the coordination core
/// touches (`lock:*` keys live in [`super::lock::FairLock`] separately;
/// this holds plain values, sets, sorted sets and hashes).
pub struct MemoryKv {
    values: RwLock<HashMap<String, Entry>>,
    collections: RwLock<Collections>,
}

impl MemoryKv {
    pub fn new() -> Self {
        MemoryKv {
            values: RwLock::new(HashMap::new()),
            collections: RwLock::new(Collections::default()),
        }
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.values
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.values.write().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        let now = Instant::now();
        let mut values = self.values.write();
        if values.get(key).map(|e| e.is_live(now)).unwrap_or(false) {
            return false;
        }
        values.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|d| now + d),
            },
        );
        true
    }

    async fn delete(&self, key: &str) -> bool {
        self.values.write().remove(key).is_some()
    }

    async fn expire(&self, key: &str, ttl: Duration) -> bool {
        let mut values = self.values.write();
        match values.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                true
            }
            None => false,
        }
    }

    async fn incr(&self, key: &str, by: i64) -> i64 {
        let mut values = self.values.write();
        let entry = values.entry(key.to_string()).or_insert_with(|| Entry {
            value: "0".to_string(),
            expires_at: None,
        });
        let current: i64 = entry.value.parse().unwrap_or(0);
        let updated = current + by;
        entry.value = updated.to_string();
        updated
    }

    async fn add_to_set(&self, key: &str, member: &str) -> bool {
        self.collections
            .write()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> bool {
        self.collections
            .write()
            .sets
            .get_mut(key)
            .map(|set| set.remove(member))
            .unwrap_or(false)
    }

    async fn size_of_set(&self, key: &str) -> usize {
        self.collections
            .read()
            .sets
            .get(key)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    async fn set_members(&self, key: &str) -> Vec<String> {
        self.collections
            .read()
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    async fn scored_range(&self, key: &str, min: f64, max: f64) -> Vec<(String, f64)> {
        self.collections
            .read()
            .sorted_sets
            .get(key)
            .map(|members| {
                let mut out: Vec<(String, f64)> = members
                    .iter()
                    .filter(|(_, &score)| score >= min && score <= max)
                    .map(|(m, &s)| (m.clone(), s))
                    .collect();
                out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
                out
            })
            .unwrap_or_default()
    }

    async fn add_to_sorted_set(&self, key: &str, member: &str, score: f64) {
        self.collections
            .write()
            .sorted_sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
    }

    async fn remove_from_sorted_set(&self, key: &str, member: &str) {
        if let Some(set) = self.collections.write().sorted_sets.get_mut(key) {
            set.remove(member);
        }
    }

    async fn hash_put_all(&self, key: &str, fields: Vec<(String, String)>) {
        let mut collections = self.collections.write();
        let hash = collections.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field, value);
        }
    }

    async fn hash_get(&self, key: &str, field: &str) -> Option<String> {
        self.collections
            .read()
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field).cloned())
    }

    async fn hash_get_all(&self, key: &str) -> Vec<(String, String)> {
        self.collections
            .read()
            .hashes
            .get(key)
            .map(|hash| hash.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn set_if_absent_only_sets_once() {
        let kv = MemoryKv::new();
        assert!(kv.set_if_absent("k", "v1", None).await);
        assert!(!kv.set_if_absent("k", "v2", None).await);
        assert_eq!(kv.get("k").await, Some("v1".to_string()));
    }

    #[tokio::test]
    async fn ttl_expiry_hides_value() {
        let kv = MemoryKv::new();
        kv.set("k", "v", Some(Duration::from_millis(10))).await;
        assert_eq!(kv.get("k").await, Some("v".to_string()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kv.get("k").await, None);
    }

    #[tokio::test]
    async fn hash_put_all_merges_not_replaces() {
        let kv = MemoryKv::new();
        kv.hash_put_all("pickBanData:1", vec![("team1".into(), "[..]".into())])
            .await;
        kv.hash_put_all("pickBanData:1", vec![("actions".into(), "[..]".into())])
            .await;
        let all = kv.hash_get_all("pickBanData:1").await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn sorted_set_range_is_ordered() {
        let kv = MemoryKv::new();
        kv.add_to_sorted_set("queue:idle", "p3", 3.0).await;
        kv.add_to_sorted_set("queue:idle", "p1", 1.0).await;
        kv.add_to_sorted_set("queue:idle", "p2", 2.0).await;
        let range = kv.scored_range("queue:idle", 0.0, 10.0).await;
        assert_eq!(
            range.into_iter().map(|(m, _)| m).collect::<Vec<_>>(),
            vec!["p1", "p2", "p3"]
        );
    }
}
