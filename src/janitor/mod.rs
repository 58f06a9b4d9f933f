//! Janitor (spec §4.9, component C9): periodic reconciliation sweep that
//! cleans up ephemeral keys whose owning phase has already moved on, and
//! force-resets `PlayerState` for anyone left stuck in a phase their
//! match has since left.
//!
//! Safe to run on multiple replicas concurrently: every step is a
//! read-then-idempotent-write over keys the relevant coordinator already
//! owns (the same active-id sets `acceptance`/`draft`/`game` maintain),
//! not a destructive blanket delete.

use crate::adapters::SqlStore;
use crate::domain::match_record::MatchStatus;
use crate::kv::KvStore;
use crate::registry::ownership::OwnershipMaps;
use crate::registry::player_state::{PlayerState, PlayerStateRegistry};
use crate::types::MatchId;
use log::{debug, info, warn};
use std::sync::Arc;

const ACCEPTANCE_ACTIVE: &str = "acceptance:active";
const DRAFT_ACTIVE: &str = "draft:active";
const GAME_ACTIVE: &str = "game:active";

fn acceptance_keys(match_id: MatchId) -> [String; 2] {
    [
        format!("match:{match_id}:acceptances"),
        format!("match:{match_id}:metadata"),
    ]
}

fn draft_keys(match_id: MatchId) -> [String; 2] {
    [
        format!("draft_flow:{match_id}:state"),
        format!("draft_flow:{match_id}:final_confirmations"),
    ]
}

fn game_keys(match_id: MatchId) -> [String; 2] {
    [
        format!("game:{match_id}:stats"),
        format!("match_vote:{match_id}:ballots"),
    ]
}

/// Maps a phase's active-id set to the `Match.status` that must hold for
/// a member to still legitimately belong there (spec §4.9 step 1).
fn expected_status(active_set: &str) -> MatchStatus {
    match active_set {
        ACCEPTANCE_ACTIVE => MatchStatus::MatchFound,
        DRAFT_ACTIVE => MatchStatus::Draft,
        _ => MatchStatus::InProgress,
    }
}

fn player_state_for(status: MatchStatus) -> Option<PlayerState> {
    match status {
        MatchStatus::MatchFound => Some(PlayerState::InMatchFound),
        MatchStatus::Draft => Some(PlayerState::InDraft),
        MatchStatus::InProgress => Some(PlayerState::InGame),
        MatchStatus::Completed | MatchStatus::Cancelled => None,
    }
}

pub struct Janitor {
    kv: Arc<dyn KvStore>,
    sql: Arc<dyn SqlStore>,
    player_state: Arc<PlayerStateRegistry>,
    ownership: Arc<OwnershipMaps>,
}

impl Janitor {
    pub fn new(
        kv: Arc<dyn KvStore>,
        sql: Arc<dyn SqlStore>,
        player_state: Arc<PlayerStateRegistry>,
        ownership: Arc<OwnershipMaps>,
    ) -> Self {
        Janitor {
            kv,
            sql,
            player_state,
            ownership,
        }
    }

    /// Full sweep (spec §4.9), intended to be invoked by a 5 min ticker
    /// owned by the app bootstrap.
    pub async fn sweep(&self) {
        let mut orphans = 0usize;
        for active_set in [ACCEPTANCE_ACTIVE, DRAFT_ACTIVE, GAME_ACTIVE] {
            orphans += self.sweep_phase_keys(active_set).await;
        }
        let resets = self.reconcile_player_states().await;

        if orphans > 0 || resets > 0 {
            info!("janitor sweep: cleared {orphans} orphaned match keys, reset {resets} player states");
        } else {
            debug!("janitor sweep: nothing to reconcile");
        }
    }

    /// spec §4.9 step 1: drop a phase's ephemeral keys for any match id
    /// whose SQL status has already moved past that phase (or the match
    /// no longer exists).
    async fn sweep_phase_keys(&self, active_set: &str) -> usize {
        let expected = expected_status(active_set);
        let mut cleared = 0;

        for match_id in self.active_ids(active_set).await {
            let record = match self.sql.load_match(match_id).await {
                Ok(record) => record,
                Err(err) => {
                    warn!("janitor: failed to load match {match_id} while sweeping {active_set}: {err}");
                    continue;
                }
            };
            let still_valid = record.map(|r| r.status == expected).unwrap_or(false);
            if still_valid {
                continue;
            }

            for key in self.phase_keys(active_set, match_id) {
                self.kv.delete(&key).await;
            }
            self.kv.remove_from_set(active_set, &match_id.to_string()).await;
            cleared += 1;
        }
        cleared
    }

    fn phase_keys(&self, active_set: &str, match_id: MatchId) -> Vec<String> {
        match active_set {
            ACCEPTANCE_ACTIVE => acceptance_keys(match_id).to_vec(),
            DRAFT_ACTIVE => draft_keys(match_id).to_vec(),
            _ => game_keys(match_id).to_vec(),
        }
    }

    async fn active_ids(&self, active_set: &str) -> Vec<MatchId> {
        self.kv
            .set_members(active_set)
            .await
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect()
    }

    /// spec §4.9 step 2: for every player the ownership map still
    /// attributes to a match, force-reset to `AVAILABLE` if that match's
    /// SQL status no longer corresponds to an owned phase (completed,
    /// cancelled, or the row is gone outright).
    async fn reconcile_player_states(&self) -> usize {
        let mut resets = 0;

        for match_id in self.ownership.active_match_ids().await {
            let record = match self.sql.load_match(match_id).await {
                Ok(record) => record,
                Err(err) => {
                    warn!("janitor: failed to load match {match_id} during player-state reconciliation: {err}");
                    continue;
                }
            };

            let expected_state = record.as_ref().and_then(|r| player_state_for(r.status));
            if expected_state.is_some() {
                // Match is still legitimately owning this phase; nothing
                // to reconcile for its players.
                continue;
            }

            for player in self.ownership.players_of(match_id).await {
                let current = self.player_state.get(&player).await;
                if matches!(
                    current,
                    PlayerState::InMatchFound | PlayerState::InDraft | PlayerState::InGame
                ) {
                    self.player_state.force_set(&player, PlayerState::Available).await;
                    resets += 1;
                }
            }
            self.ownership.clear_match_players(match_id).await;
        }
        resets
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::adapters::sql::SeaOrmSqlStore;
    use crate::domain::match_record::Match;
    use crate::kv::memory::MemoryKv;
    use sea_orm::{ConnectionTrait, Database, Schema};

    async fn in_memory_sql() -> Arc<dyn SqlStore> {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let schema = Schema::new(sea_orm::DatabaseBackend::Sqlite);
        for stmt in [
            schema.create_table_from_entity(crate::database::entities::players::Entity),
            schema.create_table_from_entity(crate::database::entities::queue_players::Entity),
            schema.create_table_from_entity(crate::database::entities::custom_matches::Entity),
        ] {
            db.execute(db.get_database_backend().build(&stmt)).await.unwrap();
        }
        Arc::new(SeaOrmSqlStore::new(db))
    }

    fn sample_match(match_id: MatchId, status: MatchStatus) -> Match {
        Match {
            match_id,
            status,
            team1_players: vec!["a1".into()],
            team2_players: vec!["b1".into()],
            average_mmr_team1: 1000.0,
            average_mmr_team2: 1000.0,
            pick_ban_data: None,
            winner_team: None,
            actual_duration_ms: None,
            lp_changes: None,
            created_at: 0,
            started_at: None,
            completed_at: None,
        }
    }

    async fn harness() -> (Janitor, Arc<dyn KvStore>, Arc<dyn SqlStore>, Arc<PlayerStateRegistry>, Arc<OwnershipMaps>) {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let sql = in_memory_sql().await;
        let player_state = Arc::new(PlayerStateRegistry::new(kv.clone()));
        let ownership = Arc::new(OwnershipMaps::new(kv.clone()));
        let janitor = Janitor::new(kv.clone(), sql.clone(), player_state.clone(), ownership.clone());
        (janitor, kv, sql, player_state, ownership)
    }

    #[tokio::test]
    async fn clears_acceptance_keys_once_match_advances_past_match_found() {
        let (janitor, kv, sql, _player_state, _ownership) = harness().await;
        sql.insert_match(&sample_match(1, MatchStatus::MatchFound)).await.unwrap();
        sql.update_match_status(1, MatchStatus::Draft).await.unwrap();

        kv.add_to_set(ACCEPTANCE_ACTIVE, "1").await;
        kv.hash_put_all(&format!("match:1:acceptances"), vec![("a1".into(), "pending".into())])
            .await;

        janitor.sweep().await;

        assert!(kv.hash_get_all("match:1:acceptances").await.is_empty());
        assert!(kv.set_members(ACCEPTANCE_ACTIVE).await.is_empty());
    }

    #[tokio::test]
    async fn leaves_still_valid_acceptance_tracking_alone() {
        let (janitor, kv, sql, _player_state, _ownership) = harness().await;
        sql.insert_match(&sample_match(1, MatchStatus::MatchFound)).await.unwrap();
        kv.add_to_set(ACCEPTANCE_ACTIVE, "1").await;

        janitor.sweep().await;

        assert_eq!(kv.set_members(ACCEPTANCE_ACTIVE).await, vec!["1".to_string()]);
    }

    #[tokio::test]
    async fn force_resets_player_stuck_in_draft_after_match_completes() {
        let (janitor, _kv, sql, player_state, ownership) = harness().await;
        sql.insert_match(&sample_match(1, MatchStatus::Draft)).await.unwrap();
        sql.update_match_status(1, MatchStatus::Completed).await.unwrap();

        ownership.register_player_match(&"a1".to_string(), 1).await.unwrap();
        player_state.force_set(&"a1".to_string(), PlayerState::InDraft).await;

        janitor.sweep().await;

        assert_eq!(player_state.get(&"a1".to_string()).await, PlayerState::Available);
        assert_eq!(ownership.get_match_for(&"a1".to_string()).await, None);
    }

    #[tokio::test]
    async fn force_resets_player_whose_match_row_is_gone() {
        let (janitor, _kv, sql, player_state, ownership) = harness().await;
        sql.insert_match(&sample_match(1, MatchStatus::InProgress)).await.unwrap();
        sql.delete_match(1).await.unwrap();

        ownership.register_player_match(&"a1".to_string(), 1).await.unwrap();
        player_state.force_set(&"a1".to_string(), PlayerState::InGame).await;

        janitor.sweep().await;

        assert_eq!(player_state.get(&"a1".to_string()).await, PlayerState::Available);
    }

    #[tokio::test]
    async fn leaves_correctly_owned_in_game_player_alone() {
        let (janitor, _kv, sql, player_state, ownership) = harness().await;
        sql.insert_match(&sample_match(1, MatchStatus::MatchFound)).await.unwrap();
        sql.update_match_status(1, MatchStatus::InProgress).await.unwrap();

        ownership.register_player_match(&"a1".to_string(), 1).await.unwrap();
        player_state.force_set(&"a1".to_string(), PlayerState::InGame).await;

        janitor.sweep().await;

        assert_eq!(player_state.get(&"a1".to_string()).await, PlayerState::InGame);
        assert_eq!(ownership.get_match_for(&"a1".to_string()).await, Some(1));
    }
}
