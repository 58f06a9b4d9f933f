//! Draft engine (spec §4.6, component C6): the 20-action ban/pick
//! sequence state machine, per-action timeout, skip-on-timeout, and
//! final confirmation by all ten players.

use crate::acceptance::DraftStarter;
use crate::adapters::SqlStore;
use crate::domain::draft::{DraftAction, DraftState};
use crate::domain::match_record::MatchStatus;
use crate::error::{CoreError, Phase};
use crate::events::{Event, EventBus};
use crate::kv::lock::new_owner;
use crate::kv::{KvStore, Locker};
use crate::types::{MatchId, Millis, SummonerName};
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Sentinel champion value for an action that elapsed its per-action
/// timeout (spec §3 "DraftAction", Glossary "SKIPPED").
pub const SKIPPED: &str = "SKIPPED";
const SYSTEM_TIMEOUT_PLAYER: &str = "system_timeout";

/// Small driver interface for the one unavoidable synchronous handoff
/// from the draft engine into the game monitor once all ten confirm
/// (spec §9 Design Notes).
#[async_trait]
pub trait GameStarter: Send + Sync {
    async fn start_game(
        &self,
        match_id: MatchId,
        team1: Vec<SummonerName>,
        team2: Vec<SummonerName>,
    ) -> Result<(), CoreError>;
}

fn state_key(match_id: MatchId) -> String {
    format!("draft_flow:{match_id}:state")
}

fn confirmations_key(match_id: MatchId) -> String {
    format!("draft_flow:{match_id}:final_confirmations")
}

/// Set of match ids with a live draft, polled by the per-action timeout
/// ticker.
const ACTIVE_SET: &str = "draft:active";

/// TTL for the `draft_flow:<matchId>:*` keys (spec §6 shared-store
/// schema: "TTL 1h").
const DRAFT_FLOW_TTL: Duration = Duration::from_secs(3600);

pub struct DraftEngine {
    kv: Arc<dyn KvStore>,
    sql: Arc<dyn SqlStore>,
    locker: Arc<dyn Locker>,
    events: Arc<EventBus>,
    game: Arc<dyn GameStarter>,
    action_timeout_ms: Millis,
    confirmation_timeout_seconds: u64,
}

impl DraftEngine {
    pub fn new(
        kv: Arc<dyn KvStore>,
        sql: Arc<dyn SqlStore>,
        locker: Arc<dyn Locker>,
        events: Arc<EventBus>,
        game: Arc<dyn GameStarter>,
        action_timeout_ms: u64,
        confirmation_timeout_seconds: u64,
    ) -> Self {
        DraftEngine {
            kv,
            sql,
            locker,
            events,
            game,
            action_timeout_ms: action_timeout_ms as Millis,
            confirmation_timeout_seconds,
        }
    }

    /// Acquires `lock:draft:<matchId>` for one logical operation. Each
    /// call mints a fresh owner token (spec §4.1) so two concurrent
    /// operations on the same match — e.g. `tick` racing `process_action`
    /// — never both get granted the lock: only a call that reuses the
    /// exact token already held by the *same* in-flight operation would
    /// reenter, and nothing here does that.
    async fn lock(&self, match_id: MatchId, wait: Duration, lease: Duration) -> Option<Box<dyn crate::kv::LockHandle>> {
        self.locker
            .try_lock(&format!("lock:draft:{match_id}"), &new_owner("draft-engine"), wait, lease)
            .await
    }

    async fn store_state(&self, state: &DraftState) {
        let payload = serde_json::to_string(state).unwrap_or_default();
        self.kv.set(&state_key(state.match_id), &payload, Some(DRAFT_FLOW_TTL)).await;
    }

    async fn load_state(&self, match_id: MatchId) -> Option<DraftState> {
        self.kv
            .get(&state_key(match_id))
            .await
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Reconstructs `DraftState` from SQL when the in-memory/shared-store
    /// copy is missing — e.g. after a replica failover (spec §8 scenario
    /// 5, I7 "SQL status is authoritative on recovery").
    async fn load_or_reconstruct(&self, match_id: MatchId) -> Result<DraftState, CoreError> {
        if let Some(state) = self.load_state(match_id).await {
            return Ok(state);
        }

        let record = self
            .sql
            .load_match(match_id)
            .await?
            .ok_or(CoreError::UnknownMatch { match_id })?;

        let mut state = DraftState::new(
            match_id,
            record.team1_players.clone(),
            record.team2_players.clone(),
            now_ms(),
        );
        if let Some(actions) = record.pick_ban_data {
            restore_actions(&mut state, actions);
        }
        self.store_state(&state).await;
        Ok(state)
    }

    /// Called by the acceptance coordinator once all ten accept (spec
    /// §4.5/§4.6). Initialises the 20-action template and publishes
    /// `draft_starting`.
    pub async fn start_draft(
        &self,
        match_id: MatchId,
        team1: Vec<SummonerName>,
        team2: Vec<SummonerName>,
    ) -> Result<(), CoreError> {
        let now = now_ms();
        let state = DraftState::new(match_id, team1.clone(), team2.clone(), now);
        self.store_state(&state).await;
        self.kv.add_to_set(ACTIVE_SET, &match_id.to_string()).await;

        let current_player = current_player_name(&state);
        self.events
            .publish(Event::DraftStarting {
                match_id,
                team1,
                team2,
                actions: state.actions.clone(),
                current_index: 0,
                current_player,
                time_remaining: (self.action_timeout_ms / 1000) as u32,
            })
            .await;

        info!("draft started for match {match_id}");
        Ok(())
    }

    /// `processAction(matchId, actionIndex, championId, byPlayer)` (spec
    /// §4.6).
    pub async fn process_action(
        &self,
        match_id: MatchId,
        action_index: usize,
        champion_id: &str,
        by_player: &SummonerName,
    ) -> Result<(), CoreError> {
        let lock = self
            .lock(match_id, Duration::from_secs(10), Duration::from_secs(5))
            .await
            .ok_or(CoreError::Contended {
                phase: Phase::Draft,
                match_id: Some(match_id),
                waited_ms: 10_000,
            })?;

        let result = self
            .process_action_locked(match_id, action_index, champion_id, by_player)
            .await;
        lock.release().await;
        result
    }

    async fn process_action_locked(
        &self,
        match_id: MatchId,
        action_index: usize,
        champion_id: &str,
        by_player: &SummonerName,
    ) -> Result<(), CoreError> {
        let mut state = self.load_or_reconstruct(match_id).await?;

        if state.is_complete() {
            return Err(CoreError::DraftComplete { match_id });
        }
        if action_index != state.current_index {
            return Err(CoreError::OutOfTurn {
                match_id,
                expected: state.current_index,
                got: action_index,
            });
        }

        let required_team = state.expected_team().expect("current_index < 20 guarantees an action exists");
        if !player_on_team(&state, by_player, required_team) {
            return Err(CoreError::WrongTeam { match_id, required_team });
        }
        if state.is_champion_used(champion_id) {
            return Err(CoreError::ChampionUsed {
                match_id,
                champion: champion_id.to_string(),
            });
        }

        let index = state.current_index;
        state.actions[index].champion_id = Some(champion_id.to_string());
        state.actions[index].by_player = Some(by_player.clone());
        state.current_index += 1;
        state.last_action_start_ms = now_ms();

        self.persist_and_publish(&mut state, false).await?;
        Ok(())
    }

    /// 1s ticker (spec §4.6 "Per-action timeout"): replaces the current
    /// action with a SKIPPED slot once `action_timeout_ms` elapses
    /// without input, and advances the draft.
    pub async fn tick(&self) {
        let active: Vec<MatchId> = self
            .kv
            .set_members(ACTIVE_SET)
            .await
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();

        for match_id in active {
            let Some(lock) = self
                .lock(match_id, Duration::from_millis(200), Duration::from_secs(5))
                .await
            else {
                continue;
            };

            let Some(mut state) = self.load_state(match_id).await else {
                self.kv.remove_from_set(ACTIVE_SET, &match_id.to_string()).await;
                lock.release().await;
                continue;
            };

            if state.is_complete() {
                let roster_size = state.team1_players.len() + state.team2_players.len();
                let expired = state
                    .confirmation_deadline_ms
                    .is_some_and(|deadline| now_ms() >= deadline && state.confirmations.len() < roster_size);
                if expired {
                    if let Err(err) = self.expire_confirmation_window(match_id, &mut state).await {
                        warn!("failed to reset expired confirmation window for match {match_id}: {err}");
                    }
                }
                lock.release().await;
                continue;
            }

            let now = now_ms();
            if now - state.last_action_start_ms >= self.action_timeout_ms {
                let index = state.current_index;
                state.actions[index].champion_id = Some(SKIPPED.to_string());
                state.actions[index].by_player = Some(SYSTEM_TIMEOUT_PLAYER.to_string());
                state.actions[index].skipped = true;
                state.current_index += 1;
                state.last_action_start_ms = now;

                if let Err(err) = self.persist_and_publish(&mut state, false).await {
                    warn!("failed to persist skipped draft action for match {match_id}: {err}");
                }
            }

            lock.release().await;
        }
    }

    async fn persist_and_publish(&self, state: &mut DraftState, confirmation_only: bool) -> Result<(), CoreError> {
        self.store_state(state).await;
        // spec §4.6 step 6: merge into the existing pickBanData, never
        // overwriting the team1/team2 roster columns (the SQL store keeps
        // those in separate columns entirely, so a merge of the action
        // array alone cannot clobber them).
        self.sql.merge_pick_ban_data(state.match_id, state).await?;

        let remaining_ms = (self.action_timeout_ms - (now_ms() - state.last_action_start_ms)).max(0);
        self.events
            .publish(Event::DraftUpdated {
                match_id: state.match_id,
                current_index: state.current_index,
                actions: state.actions.clone(),
                confirmations: state.confirmations.clone(),
                remaining_ms,
                action_timeout_ms: self.action_timeout_ms,
                confirmation_only,
            })
            .await;

        if state.is_complete() {
            // Entering the final-confirmation phase starts the 30s
            // countdown (spec §4.6); the match stays in `ACTIVE_SET` so
            // `tick` keeps polling it until all confirmations land or the
            // window lapses and resets.
            if state.confirmation_deadline_ms.is_none() {
                state.confirmation_deadline_ms = Some(now_ms() + self.confirmation_timeout_seconds as Millis * 1000);
                self.store_state(state).await;
            }
            self.events.publish(Event::DraftCompleted { match_id: state.match_id }).await;
            info!("draft complete for match {}", state.match_id);
        }

        Ok(())
    }

    /// Clears an expired, incomplete confirmation set and restarts the
    /// countdown (spec §4.6 "30 s countdown reset on each action"):
    /// confirming is use-it-or-lose-it, not a one-shot deadline.
    async fn expire_confirmation_window(&self, match_id: MatchId, state: &mut DraftState) -> Result<(), CoreError> {
        state.confirmations.clear();
        state.confirmation_deadline_ms = Some(now_ms() + self.confirmation_timeout_seconds as Millis * 1000);
        self.kv.delete(&confirmations_key(match_id)).await;
        self.store_state(state).await;
        self.sql.merge_pick_ban_data(match_id, state).await?;
        self.events
            .publish(Event::DraftUpdated {
                match_id,
                current_index: state.current_index,
                actions: state.actions.clone(),
                confirmations: state.confirmations.clone(),
                remaining_ms: 0,
                action_timeout_ms: self.action_timeout_ms,
                confirmation_only: true,
            })
            .await;
        info!("confirmation window expired for match {match_id}; confirmations reset");
        Ok(())
    }

    /// `confirm(matchId, player)` (spec §4.6 "Final confirmation"): once
    /// ten confirmations are collected the match transitions
    /// `draft → game_ready → in_progress` and C7 is invoked.
    pub async fn confirm(&self, match_id: MatchId, player: &SummonerName) -> Result<(), CoreError> {
        let lock = self
            .lock(match_id, Duration::from_secs(10), Duration::from_secs(5))
            .await
            .ok_or(CoreError::Contended {
                phase: Phase::Draft,
                match_id: Some(match_id),
                waited_ms: 10_000,
            })?;

        let result = self.confirm_locked(match_id, player).await;
        lock.release().await;
        result
    }

    async fn confirm_locked(&self, match_id: MatchId, player: &SummonerName) -> Result<(), CoreError> {
        let mut state = self.load_or_reconstruct(match_id).await?;
        if !state.is_complete() {
            return Err(CoreError::NotInPhase { match_id, phase: Phase::Draft });
        }

        if !state
            .confirmations
            .iter()
            .any(|c| c.eq_ignore_ascii_case(player))
        {
            state.confirmations.push(player.clone());
        }
        // spec §4.6: each confirmation resets the 30s countdown.
        state.confirmation_deadline_ms = Some(now_ms() + self.confirmation_timeout_seconds as Millis * 1000);
        self.kv
            .add_to_set(&confirmations_key(match_id), &player.to_lowercase())
            .await;
        self.kv.expire(&confirmations_key(match_id), DRAFT_FLOW_TTL).await;
        self.store_state(&state).await;

        let roster_size = state.team1_players.len() + state.team2_players.len();
        self.persist_and_publish(&mut state, true).await?;

        if state.confirmations.len() >= roster_size {
            self.sql.update_match_status(match_id, MatchStatus::InProgress).await?;
            self.kv.delete(&state_key(match_id)).await;
            self.kv.delete(&confirmations_key(match_id)).await;

            self.events.publish(Event::DraftConfirmed { match_id }).await;
            info!("match {match_id} confirmed by all {roster_size} players, starting game");

            self.game
                .start_game(match_id, state.team1_players.clone(), state.team2_players.clone())
                .await?;
        }
        Ok(())
    }
}

/// Lets the acceptance coordinator (C5) hand off into the draft engine
/// through the same driver-interface pattern it uses for every other
/// synchronous cross-component call (spec §9 Design Notes).
#[async_trait]
impl DraftStarter for DraftEngine {
    async fn start_draft(
        &self,
        match_id: MatchId,
        team1: Vec<SummonerName>,
        team2: Vec<SummonerName>,
    ) -> Result<(), CoreError> {
        DraftEngine::start_draft(self, match_id, team1, team2).await
    }
}

fn player_on_team(state: &DraftState, player: &SummonerName, team: u8) -> bool {
    let roster = if team == 1 { &state.team1_players } else { &state.team2_players };
    roster.iter().any(|p| p.eq_ignore_ascii_case(player))
}

fn current_player_name(state: &DraftState) -> SummonerName {
    // The canonical sequence does not pin a single author ahead of time
    // (any player on the acting team may fill the slot, spec §4.2 I5);
    // `draft_starting`'s `currentPlayer` names the team's first roster
    // slot as a UI hint, matching spec §6's `current_player` field shape.
    match state.expected_team() {
        Some(1) => state.team1_players.first().cloned().unwrap_or_default(),
        Some(2) => state.team2_players.first().cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

fn restore_actions(state: &mut DraftState, actions: Vec<DraftAction>) {
    let mut current_index = 0;
    for (i, action) in actions.into_iter().enumerate() {
        if i >= state.actions.len() {
            break;
        }
        if action.champion_id.is_some() {
            current_index = i + 1;
        }
        state.actions[i] = action;
    }
    state.current_index = current_index;
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
    use crate::kv::lock::FairLock;
    use crate::kv::memory::MemoryKv;
    use crate::kv::pubsub::MemoryBus;
    use sea_orm::{ConnectionTrait, Database, Schema};

    struct RecordingGameStarter {
        calls: parking_lot::Mutex<Vec<MatchId>>,
    }

    impl RecordingGameStarter {
        fn new() -> Self {
            RecordingGameStarter {
                calls: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GameStarter for RecordingGameStarter {
        async fn start_game(
            &self,
            match_id: MatchId,
            _team1: Vec<SummonerName>,
            _team2: Vec<SummonerName>,
        ) -> Result<(), CoreError> {
            self.calls.lock().push(match_id);
            Ok(())
        }
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
        Arc::new(crate::adapters::sql::SeaOrmSqlStore::new(db))
    }

    fn teams() -> (Vec<SummonerName>, Vec<SummonerName>) {
        (
            vec!["a1".into(), "a2".into(), "a3".into(), "a4".into(), "a5".into()],
            vec!["b1".into(), "b2".into(), "b3".into(), "b4".into(), "b5".into()],
        )
    }

    async fn harness() -> (Arc<DraftEngine>, Arc<RecordingGameStarter>, Arc<dyn SqlStore>) {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let locker: Arc<dyn Locker> = Arc::new(FairLock::new());
        let events = Arc::new(EventBus::new(Arc::new(MemoryBus::new())));
        let sql = in_memory_sql().await;
        let game = Arc::new(RecordingGameStarter::new());
        let engine = Arc::new(DraftEngine::new(kv, sql.clone(), locker, events, game.clone(), 30_000, 30));
        (engine, game, sql)
    }

    async fn seed_match(sql: &Arc<dyn SqlStore>, match_id: MatchId, team1: Vec<SummonerName>, team2: Vec<SummonerName>) {
        sql.insert_match(&crate::domain::match_record::Match {
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
    }

    #[tokio::test]
    async fn full_sequence_completes_and_confirms() {
        let (engine, game, sql) = harness().await;
        let (team1, team2) = teams();
        seed_match(&sql, 1, team1.clone(), team2.clone()).await;
        engine.start_draft(1, team1.clone(), team2.clone()).await.unwrap();

        let champions = (0..20).map(|i| format!("champ{i}"));
        for (i, champion) in champions.enumerate() {
            let team = if [0, 2, 4, 6, 8, 10, 13, 14, 17, 18].contains(&i) { &team1 } else { &team2 };
            engine.process_action(1, i, &champion, &team[0]).await.unwrap();
        }

        for player in team1.iter().chain(team2.iter()) {
            engine.confirm(1, player).await.unwrap();
        }

        assert_eq!(game.calls.lock().as_slice(), &[1]);
    }

    #[tokio::test]
    async fn out_of_turn_action_is_rejected() {
        let (engine, _game, sql) = harness().await;
        let (team1, team2) = teams();
        seed_match(&sql, 1, team1.clone(), team2.clone()).await;
        engine.start_draft(1, team1.clone(), team2.clone()).await.unwrap();

        let err = engine.process_action(1, 1, "ahri", &team1[0]).await.unwrap_err();
        assert!(matches!(err, CoreError::OutOfTurn { .. }));
    }

    #[tokio::test]
    async fn wrong_team_action_is_rejected() {
        let (engine, _game, sql) = harness().await;
        let (team1, team2) = teams();
        seed_match(&sql, 1, team1.clone(), team2.clone()).await;
        engine.start_draft(1, team1.clone(), team2.clone()).await.unwrap();

        let err = engine.process_action(1, 0, "ahri", &team2[0]).await.unwrap_err();
        assert!(matches!(err, CoreError::WrongTeam { .. }));
    }

    #[tokio::test]
    async fn duplicate_champion_is_rejected() {
        let (engine, _game, sql) = harness().await;
        let (team1, team2) = teams();
        seed_match(&sql, 1, team1.clone(), team2.clone()).await;
        engine.start_draft(1, team1.clone(), team2.clone()).await.unwrap();

        engine.process_action(1, 0, "Ahri", &team1[0]).await.unwrap();
        let err = engine.process_action(1, 1, "ahri", &team2[0]).await.unwrap_err();
        assert!(matches!(err, CoreError::ChampionUsed { .. }));
    }

    #[tokio::test]
    async fn action_index_twenty_is_draft_complete() {
        let (engine, _game, sql) = harness().await;
        let (team1, team2) = teams();
        seed_match(&sql, 1, team1.clone(), team2.clone()).await;
        let mut state = DraftState::new(1, team1, team2, 0);
        state.current_index = 20;
        engine.store_state(&state).await;

        let err = engine.process_action(1, 20, "ahri", &"a1".to_string()).await.unwrap_err();
        assert!(matches!(err, CoreError::DraftComplete { .. }));
    }

    #[tokio::test]
    async fn timeout_tick_skips_current_action() {
        let (engine, _game, sql) = harness().await;
        let (team1, team2) = teams();
        seed_match(&sql, 1, team1.clone(), team2.clone()).await;
        engine.start_draft(1, team1.clone(), team2.clone()).await.unwrap();

        // Force the clock back so the ticker treats action 0 as overdue.
        let mut state = engine.load_state(1).await.unwrap();
        state.last_action_start_ms = now_ms() - 40_000;
        engine.store_state(&state).await;

        engine.tick().await;

        let state = engine.load_state(1).await.unwrap();
        assert_eq!(state.current_index, 1);
        assert_eq!(state.actions[0].champion_id.as_deref(), Some(SKIPPED));
        assert!(state.actions[0].skipped);

        // A later pick of the same champion string succeeds: SKIPPED is
        // not a reservation (spec §8 scenario 4).
        engine.process_action(1, 1, SKIPPED, &team2[0]).await.unwrap();
    }

    #[tokio::test]
    async fn failover_reconstructs_from_sql_pick_ban_data() {
        let (engine, _game, sql) = harness().await;
        let (team1, team2) = teams();
        seed_match(&sql, 1, team1.clone(), team2.clone()).await;
        engine.start_draft(1, team1.clone(), team2.clone()).await.unwrap();

        for i in 0..12 {
            let team = if [0, 2, 4, 6, 8, 10].contains(&i) { &team1 } else { &team2 };
            engine.process_action(1, i, &format!("champ{i}"), &team[0]).await.unwrap();
        }

        // Simulate the replica that held the draft crashing: drop the
        // shared-store copy, keep only what SQL has.
        engine.kv.delete(&state_key(1)).await;

        engine.process_action(1, 12, "champ12", &team2[0]).await.unwrap();
        let state = engine.load_state(1).await.unwrap();
        assert_eq!(state.current_index, 13);
        assert!(state.actions[0..12].iter().all(|a| a.champion_id.is_some()));
    }
}
