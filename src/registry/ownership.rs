//! Ownership maps (spec §4.3, component C3): `player→matchId`,
//! `matchId→players`.

use crate::error::{CoreError, CoreResult};
use crate::kv::KvStore;
use crate::types::{MatchId, SummonerName};
use std::sync::Arc;

fn player_key(player: &str) -> String {
    format!("lock:player_match:{}", player.to_lowercase())
}

fn match_set_key(match_id: MatchId) -> String {
    format!("match:{match_id}:players")
}

/// Set of match ids with at least one owned player, maintained the same
/// way the queue/acceptance/draft/game coordinators track their own
/// active-id sets. The `KvStore` driver interface deliberately exposes no
/// keyspace-enumeration primitive (mirroring why `KEYS` is avoided against
/// a real Redis), so this is what lets the janitor (C9) walk every
/// currently-owned match without scanning raw `lock:player_match:*` keys.
const ACTIVE_MATCHES_SET: &str = "ownership:active_matches";

pub struct OwnershipMaps {
    kv: Arc<dyn KvStore>,
}

impl OwnershipMaps {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        OwnershipMaps { kv }
    }

    /// Atomic set-if-absent; fails with `AlreadyOwned` if a different
    /// match already owns the player (spec §4.3).
    pub async fn register_player_match(
        &self,
        player: &SummonerName,
        match_id: MatchId,
    ) -> CoreResult<()> {
        let key = player_key(player);
        let value = match_id.to_string();
        if self.kv.set_if_absent(&key, &value, None).await {
            self.kv.add_to_set(&match_set_key(match_id), player).await;
            self.kv.add_to_set(ACTIVE_MATCHES_SET, &value).await;
            return Ok(());
        }
        let existing = self.kv.get(&key).await.unwrap_or_default();
        if existing == value {
            return Ok(());
        }
        Err(CoreError::AlreadyOwned {
            summoner_name: player.clone(),
            existing: existing.parse().unwrap_or_default(),
        })
    }

    /// Iterates the match's player set, clears each `player→matchId`
    /// mapping only if it still points at this match, then deletes the
    /// set (spec §4.3).
    pub async fn clear_match_players(&self, match_id: MatchId) {
        let set_key = match_set_key(match_id);
        let members = self.kv.set_members(&set_key).await;
        for player in &members {
            let key = player_key(player);
            if self.kv.get(&key).await.as_deref() == Some(match_id.to_string().as_str()) {
                self.kv.delete(&key).await;
            }
        }
        self.kv.delete(&set_key).await;
        self.kv
            .remove_from_set(ACTIVE_MATCHES_SET, &match_id.to_string())
            .await;
    }

    pub async fn get_match_for(&self, player: &SummonerName) -> Option<MatchId> {
        self.kv
            .get(&player_key(player))
            .await
            .and_then(|raw| raw.parse().ok())
    }

    pub async fn players_of(&self, match_id: MatchId) -> Vec<SummonerName> {
        self.kv.set_members(&match_set_key(match_id)).await
    }

    /// Every match id with at least one currently owned player, for the
    /// janitor's PlayerState reconciliation sweep (spec §4.9 step 2).
    pub async fn active_match_ids(&self) -> Vec<MatchId> {
        self.kv
            .set_members(ACTIVE_MATCHES_SET)
            .await
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kv::memory::MemoryKv;

    fn maps() -> OwnershipMaps {
        OwnershipMaps::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn registers_and_looks_up() {
        let maps = maps();
        maps.register_player_match(&"Alice".to_string(), 1).await.unwrap();
        assert_eq!(maps.get_match_for(&"Alice".to_string()).await, Some(1));
    }

    #[tokio::test]
    async fn rejects_conflicting_registration() {
        let maps = maps();
        let alice = "Alice".to_string();
        maps.register_player_match(&alice, 1).await.unwrap();
        let err = maps.register_player_match(&alice, 2).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyOwned { .. }));
    }

    #[tokio::test]
    async fn idempotent_for_same_match() {
        let maps = maps();
        let alice = "Alice".to_string();
        maps.register_player_match(&alice, 1).await.unwrap();
        maps.register_player_match(&alice, 1).await.unwrap();
    }

    #[tokio::test]
    async fn clear_match_players_removes_both_sides() {
        let maps = maps();
        maps.register_player_match(&"Alice".to_string(), 1).await.unwrap();
        maps.register_player_match(&"Bob".to_string(), 1).await.unwrap();
        maps.clear_match_players(1).await;
        assert_eq!(maps.get_match_for(&"Alice".to_string()).await, None);
        assert_eq!(maps.players_of(1).await.len(), 0);
    }

    #[tokio::test]
    async fn active_match_ids_tracks_registration_and_clearing() {
        let maps = maps();
        maps.register_player_match(&"Alice".to_string(), 1).await.unwrap();
        maps.register_player_match(&"Carol".to_string(), 2).await.unwrap();
        let mut ids = maps.active_match_ids().await;
        ids.sort();
        assert_eq!(ids, vec![1, 2]);

        maps.clear_match_players(1).await;
        assert_eq!(maps.active_match_ids().await, vec![2]);
    }
}
