//! Game monitor (spec §4.7, component C7): in-progress tracking, expiry
//! timeout, finalisation (winner declared or voted), LP recomputation,
//! and teardown.

use crate::adapters::{ChatBridge, GameClientBridge, SqlStore};
use crate::domain::lp::team_deltas;
use crate::domain::match_record::MatchStatus;
use crate::draft::GameStarter;
use crate::error::{CoreError, Phase};
use crate::events::{Event, EventBus};
use crate::kv::lock::new_owner;
use crate::kv::{KvStore, Locker};
use crate::registry::ownership::OwnershipMaps;
use crate::registry::player_state::{PlayerState, PlayerStateRegistry};
use crate::types::{MatchId, Millis, SummonerName};
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Set of match ids currently being monitored in-progress (spec §6
/// shared-store schema: "game:active (set)").
const ACTIVE_SET: &str = "game:active";

fn stats_key(match_id: MatchId) -> String {
    format!("game:{match_id}:stats")
}

fn vote_key(match_id: MatchId) -> String {
    format!("match_vote:{match_id}:ballots")
}

/// Ballots needed for a declared winner by vote (spec §6 `totalNeeded:6`).
const VOTES_NEEDED: usize = 6;

/// Which `spectator:*` channel (spec §6) a `spectator_action` call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectatorAction {
    Mute,
    Unmute,
    Add,
    Remove,
}

pub struct GameMonitor {
    kv: Arc<dyn KvStore>,
    sql: Arc<dyn SqlStore>,
    locker: Arc<dyn Locker>,
    events: Arc<EventBus>,
    player_state: Arc<PlayerStateRegistry>,
    ownership: Arc<OwnershipMaps>,
    chat: Arc<dyn ChatBridge>,
    game_client: Arc<dyn GameClientBridge>,
    timeout_ms: Millis,
}

impl GameMonitor {
    pub fn new(
        kv: Arc<dyn KvStore>,
        sql: Arc<dyn SqlStore>,
        locker: Arc<dyn Locker>,
        events: Arc<EventBus>,
        player_state: Arc<PlayerStateRegistry>,
        ownership: Arc<OwnershipMaps>,
        chat: Arc<dyn ChatBridge>,
        game_client: Arc<dyn GameClientBridge>,
        timeout_ms: u64,
    ) -> Self {
        GameMonitor {
            kv,
            sql,
            locker,
            events,
            player_state,
            ownership,
            chat,
            game_client,
            timeout_ms: timeout_ms as Millis,
        }
    }

    /// `finish(matchId, winnerTeam, reason)` (spec §4.7 "Finalisation"),
    /// under `lock:game:finish:<matchId>`.
    pub async fn finish(&self, match_id: MatchId, winner_team: u8, reason: &str) -> Result<(), CoreError> {
        let lock = self
            .locker
            .try_lock(
                &format!("lock:game:finish:{match_id}"),
                &new_owner("game-monitor-finish"),
                Duration::from_secs(10),
                Duration::from_secs(10),
            )
            .await
            .ok_or(CoreError::Contended {
                phase: Phase::Game,
                match_id: Some(match_id),
                waited_ms: 10_000,
            })?;

        let result = self.finish_locked(match_id, winner_team, reason).await;
        lock.release().await;
        result
    }

    async fn finish_locked(&self, match_id: MatchId, winner_team: u8, reason: &str) -> Result<(), CoreError> {
        let Some(record) = self.sql.load_match(match_id).await? else {
            return Ok(());
        };
        if record.status != MatchStatus::InProgress {
            // spec §4.7 step 1: "Validate SQL status == in_progress; else no-op."
            return Ok(());
        }

        let roster: Vec<SummonerName> = record
            .team1_players
            .iter()
            .chain(record.team2_players.iter())
            .cloned()
            .collect();

        // step 2: reconcile, tolerating prior desync.
        for player in &roster {
            self.player_state.force_set(player, PlayerState::InGame).await;
        }

        let started_at = self.started_at(match_id).await.unwrap_or(record.created_at);
        let actual_duration_ms = (now_ms() - started_at).max(0);

        let (delta1, delta2) = team_deltas(record.average_mmr_team1, record.average_mmr_team2, winner_team);
        let mut lp_changes: Vec<(SummonerName, i64)> = record
            .team1_players
            .iter()
            .map(|p| (p.clone(), delta1))
            .collect();
        lp_changes.extend(record.team2_players.iter().map(|p| (p.clone(), delta2)));

        // steps 3-4: LP changes, status=completed/winnerTeam/actualDuration.
        self.sql
            .finalize_match(match_id, winner_team, actual_duration_ms, lp_changes)
            .await?;

        // step 5.
        for player in &roster {
            self.player_state.set(player, PlayerState::Available).await.ok();
        }

        // step 6.
        self.ownership.clear_match_players(match_id).await;
        self.sql.delete_match(match_id).await.ok();
        self.clear_tracking(match_id).await;

        self.events
            .publish(Event::GameFinished { match_id, winner_team })
            .await;
        self.chat.announce_game_finished(match_id, winner_team).await;

        info!("match {match_id} finished, winner=team{winner_team} ({reason})");
        Ok(())
    }

    /// `voteWinner(matchId, player, team)` (spec §4.7 "Winner vote"): six
    /// agreeing ballots finalise the match under the same lock family as
    /// `finish`.
    pub async fn vote_winner(&self, match_id: MatchId, player: &SummonerName, team: u8) -> Result<(), CoreError> {
        let lock = self
            .locker
            .try_lock(
                &format!("lock:game:finish:{match_id}"),
                &new_owner("game-monitor-vote"),
                Duration::from_secs(5),
                Duration::from_secs(10),
            )
            .await
            .ok_or(CoreError::Contended {
                phase: Phase::Game,
                match_id: Some(match_id),
                waited_ms: 5_000,
            })?;

        self.kv
            .hash_put_all(&vote_key(match_id), vec![(player.to_lowercase(), team.to_string())])
            .await;

        let ballots = self.kv.hash_get_all(&vote_key(match_id)).await;
        let votes_team1 = ballots.iter().filter(|(_, v)| v == "1").count();
        let votes_team2 = ballots.iter().filter(|(_, v)| v == "2").count();

        self.events
            .publish(Event::GameWinnerVote {
                match_id,
                summoner_name: player.clone(),
                voted_team: team,
                votes_team1,
                votes_team2,
                total_needed: VOTES_NEEDED,
            })
            .await;

        let decided = if votes_team1 >= VOTES_NEEDED {
            Some(1)
        } else if votes_team2 >= VOTES_NEEDED {
            Some(2)
        } else {
            None
        };

        let result = if let Some(winner_team) = decided {
            self.finish_locked(match_id, winner_team, "vote").await
        } else {
            Ok(())
        };
        lock.release().await;
        result
    }

    /// 5s ticker (spec §4.7 "Expiry"): cancels any game running longer
    /// than `timeout_ms`, single-shot via `lock:game:cancel:<matchId>`.
    pub async fn tick(&self) {
        let active: Vec<MatchId> = self
            .kv
            .set_members(ACTIVE_SET)
            .await
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();

        let now = now_ms();
        for match_id in active {
            let Some(started_at) = self.started_at(match_id).await else {
                self.kv.remove_from_set(ACTIVE_SET, &match_id.to_string()).await;
                continue;
            };
            if now - started_at <= self.timeout_ms {
                continue;
            }

            let Some(lock) = self
                .locker
                .try_lock(
                    &format!("lock:game:cancel:{match_id}"),
                    &new_owner("game-monitor-cancel"),
                    Duration::from_millis(200),
                    Duration::from_secs(30),
                )
                .await
            else {
                // Another replica is already handling (or has already
                // handled) this expiry.
                continue;
            };

            if let Err(err) = self.cancel(match_id, "timeout").await {
                warn!("failed to cancel expired game {match_id}: {err}");
            }
            lock.release().await;
        }
    }

    async fn cancel(&self, match_id: MatchId, reason: &str) -> Result<(), CoreError> {
        let Some(record) = self.sql.load_match(match_id).await? else {
            return Ok(());
        };
        if record.status != MatchStatus::InProgress {
            return Ok(());
        }

        let roster: Vec<SummonerName> = record
            .team1_players
            .iter()
            .chain(record.team2_players.iter())
            .cloned()
            .collect();

        self.ownership.clear_match_players(match_id).await;
        for player in &roster {
            self.player_state.force_set(player, PlayerState::InGame).await;
            self.player_state.set(player, PlayerState::Available).await.ok();
        }

        self.sql.update_match_status(match_id, MatchStatus::Cancelled).await.ok();
        self.clear_tracking(match_id).await;

        self.events
            .publish(Event::MatchCancelled {
                match_id,
                reason: reason.to_string(),
                declined_player: None,
            })
            .await;
        self.chat.announce_match_cancelled(match_id, reason).await;

        warn!("game {match_id} cancelled ({reason})");
        Ok(())
    }

    /// `spectator:{mute,unmute,add,remove}` (spec §6): spectator roster
    /// management for a live match, fanned out through the same bus as
    /// every other game event. The game client adapter is the source of
    /// truth for who is spectating (spec §1, out of scope here); this
    /// only validates the match is still being monitored and republishes
    /// the action for replica fan-out.
    pub async fn spectator_action(
        &self,
        match_id: MatchId,
        action: SpectatorAction,
        spectator_name: &SummonerName,
        performed_by: &SummonerName,
    ) -> Result<(), CoreError> {
        if !self.kv.set_members(ACTIVE_SET).await.iter().any(|s| s == &match_id.to_string()) {
            return Err(CoreError::UnknownMatch { match_id });
        }

        let payload = crate::events::SpectatorPayload {
            match_id,
            spectator_name: spectator_name.clone(),
            performed_by: performed_by.clone(),
        };
        let event = match action {
            SpectatorAction::Mute => Event::SpectatorMute(payload),
            SpectatorAction::Unmute => Event::SpectatorUnmute(payload),
            SpectatorAction::Add => Event::SpectatorAdd(payload),
            SpectatorAction::Remove => Event::SpectatorRemove(payload),
        };
        self.events.publish(event).await;
        Ok(())
    }

    async fn started_at(&self, match_id: MatchId) -> Option<Millis> {
        self.kv
            .hash_get(&stats_key(match_id), "started_at")
            .await
            .and_then(|s| s.parse().ok())
    }

    async fn clear_tracking(&self, match_id: MatchId) {
        self.kv.delete(&stats_key(match_id)).await;
        self.kv.delete(&vote_key(match_id)).await;
        self.kv.remove_from_set(ACTIVE_SET, &match_id.to_string()).await;
    }
}

/// Entry point invoked by the draft engine once all ten confirm (spec
/// §4.6 final confirmation → §4.7 entry): records the active-games
/// membership, transitions `IN_DRAFT→IN_GAME`, launches the lobby, and
/// publishes `game_started` directed to the ten roster sessions.
#[async_trait]
impl GameStarter for GameMonitor {
    async fn start_game(
        &self,
        match_id: MatchId,
        team1: Vec<SummonerName>,
        team2: Vec<SummonerName>,
    ) -> Result<(), CoreError> {
        let now = now_ms();
        self.kv
            .hash_put_all(&stats_key(match_id), vec![("started_at".to_string(), now.to_string())])
            .await;
        self.kv.add_to_set(ACTIVE_SET, &match_id.to_string()).await;

        let roster: Vec<SummonerName> = team1.iter().chain(team2.iter()).cloned().collect();
        for player in &roster {
            self.player_state.set(player, PlayerState::InGame).await?;
        }

        if let Some(record) = self.sql.load_match(match_id).await? {
            if let Err(err) = self.game_client.launch_lobby(&record).await {
                warn!("failed to launch game client lobby for match {match_id}: {err}");
            }
        }

        self.events
            .publish(Event::GameStarted {
                match_id,
                start_time: now,
                team1,
                team2,
            })
            .await;

        info!("game started for match {match_id}");
        Ok(())
    }
}

fn now_ms() -> Millis {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::adapters::chat_bridge::NullChatBridge;
    use crate::adapters::game_client::NullGameClientBridge;
    use crate::adapters::sql::SeaOrmSqlStore;
    use crate::domain::match_record::Match;
    use crate::kv::lock::FairLock;
    use crate::kv::memory::MemoryKv;
    use crate::kv::pubsub::MemoryBus;
    use sea_orm::{ConnectionTrait, Database, Schema};

    fn teams() -> (Vec<SummonerName>, Vec<SummonerName>) {
        (
            vec!["a1".into(), "a2".into(), "a3".into(), "a4".into(), "a5".into()],
            vec!["b1".into(), "b2".into(), "b3".into(), "b4".into(), "b5".into()],
        )
    }

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

    async fn harness() -> (Arc<GameMonitor>, Arc<dyn SqlStore>, Arc<PlayerStateRegistry>) {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let locker: Arc<dyn Locker> = Arc::new(FairLock::new());
        let events = Arc::new(EventBus::new(Arc::new(MemoryBus::new())));
        let player_state = Arc::new(PlayerStateRegistry::new(kv.clone()));
        let ownership = Arc::new(OwnershipMaps::new(kv.clone()));
        let sql = in_memory_sql().await;
        let monitor = Arc::new(GameMonitor::new(
            kv,
            sql.clone(),
            locker,
            events,
            player_state.clone(),
            ownership,
            Arc::new(NullChatBridge),
            Arc::new(NullGameClientBridge),
            3_600_000,
        ));
        (monitor, sql, player_state)
    }

    async fn seed_in_progress(sql: &Arc<dyn SqlStore>, match_id: MatchId, team1: Vec<SummonerName>, team2: Vec<SummonerName>) {
        sql.insert_match(&Match {
            match_id,
            status: MatchStatus::MatchFound,
            team1_players: team1,
            team2_players: team2,
            average_mmr_team1: 1000.0,
            average_mmr_team2: 1000.0,
            pick_ban_data: None,
            winner_team: None,
            actual_duration_ms: None,
            lp_changes: None,
            created_at: 0,
            started_at: None,
            completed_at: None,
        })
        .await
        .unwrap();
        sql.update_match_status(match_id, MatchStatus::InProgress).await.unwrap();
    }

    #[tokio::test]
    async fn start_game_transitions_roster_and_tracks_active() {
        let (monitor, sql, player_state) = harness().await;
        let (team1, team2) = teams();
        seed_in_progress(&sql, 1, team1.clone(), team2.clone()).await;

        for player in team1.iter().chain(team2.iter()) {
            player_state.set(player, PlayerState::InQueue).await.unwrap();
            player_state.set(player, PlayerState::InMatchFound).await.unwrap();
            player_state.set(player, PlayerState::InDraft).await.unwrap();
        }

        monitor.start_game(1, team1.clone(), team2.clone()).await.unwrap();

        for player in team1.iter().chain(team2.iter()) {
            assert_eq!(player_state.get(player).await, PlayerState::InGame);
        }
    }

    #[tokio::test]
    async fn finish_completes_match_and_frees_players() {
        let (monitor, sql, player_state) = harness().await;
        let (team1, team2) = teams();
        seed_in_progress(&sql, 1, team1.clone(), team2.clone()).await;
        monitor.start_game(1, team1.clone(), team2.clone()).await.unwrap();

        monitor.finish(1, 1, "declared").await.unwrap();

        for player in team1.iter().chain(team2.iter()) {
            assert_eq!(player_state.get(player).await, PlayerState::Available);
        }
        assert!(sql.load_match(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn finish_is_idempotent_once_match_row_is_gone() {
        let (monitor, sql, _player_state) = harness().await;
        let (team1, team2) = teams();
        seed_in_progress(&sql, 1, team1.clone(), team2.clone()).await;
        monitor.start_game(1, team1, team2).await.unwrap();

        monitor.finish(1, 1, "declared").await.unwrap();
        monitor.finish(1, 1, "declared").await.unwrap();
    }

    #[tokio::test]
    async fn six_votes_for_one_team_finalises_the_match() {
        let (monitor, sql, _player_state) = harness().await;
        let (team1, team2) = teams();
        seed_in_progress(&sql, 1, team1.clone(), team2.clone()).await;
        monitor.start_game(1, team1.clone(), team2.clone()).await.unwrap();

        for player in team1.iter().take(4).chain(team2.iter().take(2)) {
            monitor.vote_winner(1, player, 1).await.unwrap();
        }

        assert!(sql.load_match(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn spectator_action_rejects_unknown_match() {
        let (monitor, _sql, _player_state) = harness().await;
        let err = monitor
            .spectator_action(99, SpectatorAction::Add, &"watcher".to_string(), &"host".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownMatch { match_id: 99 }));
    }

    #[tokio::test]
    async fn spectator_action_publishes_for_active_match() {
        let (monitor, sql, _player_state) = harness().await;
        let (team1, team2) = teams();
        seed_in_progress(&sql, 1, team1.clone(), team2.clone()).await;
        monitor.start_game(1, team1, team2).await.unwrap();

        monitor
            .spectator_action(1, SpectatorAction::Mute, &"watcher".to_string(), &"host".to_string())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn underdog_win_awards_asymmetric_lp() {
        let (monitor, sql, _player_state) = harness().await;
        sql.insert_match(&Match {
            match_id: 2,
            status: MatchStatus::MatchFound,
            team1_players: vec!["a1".into()],
            team2_players: vec!["b1".into()],
            average_mmr_team1: 900.0,
            average_mmr_team2: 1100.0,
            pick_ban_data: None,
            winner_team: None,
            actual_duration_ms: None,
            lp_changes: None,
            created_at: 0,
            started_at: None,
            completed_at: None,
        })
        .await
        .unwrap();
        sql.update_match_status(2, MatchStatus::InProgress).await.unwrap();
        monitor.start_game(2, vec!["a1".into()], vec!["b1".into()]).await.unwrap();

        monitor.finish(2, 1, "declared").await.unwrap();
        assert!(sql.load_match(2).await.unwrap().is_none());
    }
}
