//! Acceptance coordinator (spec §4.5, component C5): match-found
//! countdown, per-player accept/decline, bot auto-accept, and the
//! all-accept/any-decline outcomes that hand off into the draft engine
//! or back into the queue.

use crate::adapters::{ChatBridge, SqlStore};
use crate::domain::match_record::{Match, MatchStatus};
use crate::domain::queue_entry::QueueEntry;
use crate::error::{CoreError, Phase};
use crate::events::{Event, EventBus};
use crate::kv::lock::new_owner;
use crate::kv::{KvStore, Locker};
use crate::queue::matcher::FormedMatch;
use crate::queue::QueueEngine;
use crate::registry::player_state::{PlayerState, PlayerStateRegistry};
use crate::registry::OwnershipMaps;
use crate::types::{MatchId, Millis, SummonerName};
use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Small driver interface for the one unavoidable synchronous handoff
/// from acceptance into the draft engine (spec §9 "Design Notes": "Where
/// a synchronous call is unavoidable ... the caller passes through a
/// small driver interface injected at construction.").
#[async_trait]
pub trait DraftStarter: Send + Sync {
    async fn start_draft(
        &self,
        match_id: MatchId,
        team1: Vec<SummonerName>,
        team2: Vec<SummonerName>,
    ) -> Result<(), CoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackState {
    Pending,
    Accepted,
    Declined,
}

impl TrackState {
    fn as_str(self) -> &'static str {
        match self {
            TrackState::Pending => "pending",
            TrackState::Accepted => "accepted",
            TrackState::Declined => "declined",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "accepted" => TrackState::Accepted,
            "declined" => TrackState::Declined,
            _ => TrackState::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackStatus {
    Waiting,
    AllAccepted,
    Cancelled,
    Expired,
}

impl TrackStatus {
    fn as_str(self) -> &'static str {
        match self {
            TrackStatus::Waiting => "waiting",
            TrackStatus::AllAccepted => "all_accepted",
            TrackStatus::Cancelled => "cancelled",
            TrackStatus::Expired => "expired",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "all_accepted" => TrackStatus::AllAccepted,
            "cancelled" => TrackStatus::Cancelled,
            "expired" => TrackStatus::Expired,
            _ => TrackStatus::Waiting,
        }
    }
}

fn acceptances_key(match_id: MatchId) -> String {
    format!("match:{match_id}:acceptances")
}

fn metadata_key(match_id: MatchId) -> String {
    format!("match:{match_id}:metadata")
}

/// Set of match ids with a live acceptance countdown, polled by `tick`.
const ACTIVE_SET: &str = "acceptance:active";

/// TTL metadata/acceptance hashes get once a match resolves to terminal
/// (spec §6 shared-store schema: "match:<id>:metadata (hash, TTL 1 min
/// after terminal)").
const TERMINAL_TTL: Duration = Duration::from_secs(60);

pub struct AcceptanceCoordinator {
    kv: Arc<dyn KvStore>,
    sql: Arc<dyn SqlStore>,
    locker: Arc<dyn Locker>,
    events: Arc<EventBus>,
    player_state: Arc<PlayerStateRegistry>,
    ownership: Arc<OwnershipMaps>,
    queue: Arc<QueueEngine>,
    chat: Arc<dyn ChatBridge>,
    draft: Arc<dyn DraftStarter>,
    timeout_ms: i64,
    bot_delay: Duration,
}

impl AcceptanceCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kv: Arc<dyn KvStore>,
        sql: Arc<dyn SqlStore>,
        locker: Arc<dyn Locker>,
        events: Arc<EventBus>,
        player_state: Arc<PlayerStateRegistry>,
        ownership: Arc<OwnershipMaps>,
        queue: Arc<QueueEngine>,
        chat: Arc<dyn ChatBridge>,
        draft: Arc<dyn DraftStarter>,
        timeout_seconds: u64,
        bot_delay: Duration,
    ) -> Self {
        AcceptanceCoordinator {
            kv,
            sql,
            locker,
            events,
            player_state,
            ownership,
            queue,
            chat,
            draft,
            timeout_ms: (timeout_seconds as i64) * 1000,
            bot_delay,
        }
    }

    /// Creates the acceptance tracking record plus the `player→matchId`
    /// ownership for all ten, transitions each to `IN_MATCH_FOUND`, and
    /// publishes `match:found` (spec §4.5 entry).
    pub async fn start(
        self: &Arc<Self>,
        match_id: MatchId,
        formed: FormedMatch,
        cohort: Vec<QueueEntry>,
        now_ms: Millis,
    ) -> Result<(), CoreError> {
        let team1: Vec<SummonerName> = formed.team1.iter().map(|p| p.summoner_name.clone()).collect();
        let team2: Vec<SummonerName> = formed.team2.iter().map(|p| p.summoner_name.clone()).collect();
        let roster: Vec<SummonerName> = team1.iter().chain(team2.iter()).cloned().collect();

        for player in &roster {
            self.ownership.register_player_match(player, match_id).await?;
        }

        let acceptance_fields = roster
            .iter()
            .map(|p| (p.to_lowercase(), TrackState::Pending.as_str().to_string()))
            .collect();
        self.kv.hash_put_all(&acceptances_key(match_id), acceptance_fields).await;

        let metadata = vec![
            ("status".to_string(), TrackStatus::Waiting.as_str().to_string()),
            ("start_time_ms".to_string(), now_ms.to_string()),
            ("team1".to_string(), serde_json::to_string(&team1).unwrap_or_default()),
            ("team2".to_string(), serde_json::to_string(&team2).unwrap_or_default()),
            ("cohort".to_string(), serde_json::to_string(&cohort).unwrap_or_default()),
        ];
        self.kv.hash_put_all(&metadata_key(match_id), metadata).await;
        self.kv.add_to_set(ACTIVE_SET, &match_id.to_string()).await;

        let match_record = Match {
            match_id,
            status: MatchStatus::MatchFound,
            team1_players: team1.clone(),
            team2_players: team2.clone(),
            average_mmr_team1: formed.average_mmr_team1,
            average_mmr_team2: formed.average_mmr_team2,
            pick_ban_data: None,
            winner_team: None,
            actual_duration_ms: None,
            lp_changes: None,
            created_at: now_ms,
            started_at: None,
            completed_at: None,
        };
        self.sql.insert_match(&match_record).await?;

        for player in &roster {
            self.player_state.set(player, PlayerState::InMatchFound).await?;
        }

        self.events
            .publish(Event::MatchFound {
                match_id,
                team1: team1.clone(),
                team2: team2.clone(),
                avg_mmr1: formed.average_mmr_team1,
                avg_mmr2: formed.average_mmr_team2,
                timeout_seconds: (self.timeout_ms / 1000) as u32,
            })
            .await;
        self.chat.announce_match_found(match_id, &roster).await;

        info!("match {match_id} found, awaiting acceptance from {} players", roster.len());

        // spec §4.5 "Bot auto-accept": `Bot`-prefixed names auto-accept
        // `bot.auto_accept_delay_ms` after match_found is emitted.
        for player in &roster {
            if player.starts_with("Bot") {
                let this = self.clone();
                let player = player.clone();
                let delay = self.bot_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(err) = this.accept(match_id, &player).await {
                        warn!("bot auto-accept for {player} on match {match_id} failed: {err}");
                    }
                });
            }
        }

        Ok(())
    }

    /// `accept(matchId, player)` (spec §4.5). Idempotent per spec §8's
    /// acceptance idempotence law.
    pub async fn accept(&self, match_id: MatchId, player: &SummonerName) -> Result<(), CoreError> {
        let lock = self
            .locker
            .try_lock(
                &format!("lock:match_acceptance:{match_id}"),
                &new_owner("acceptance-coordinator"),
                Duration::from_secs(2),
                Duration::from_secs(10),
            )
            .await
            .ok_or(CoreError::Contended {
                phase: Phase::Acceptance,
                match_id: Some(match_id),
                waited_ms: 2_000,
            })?;

        let result = self.accept_locked(match_id, player).await;
        lock.release().await;
        result
    }

    async fn accept_locked(&self, match_id: MatchId, player: &SummonerName) -> Result<(), CoreError> {
        let status = self
            .status_of(match_id)
            .await
            .ok_or(CoreError::UnknownMatch { match_id })?;
        if status != TrackStatus::Waiting {
            // The match already resolved one way or the other; a late
            // accept has no effect (spec §8 boundary: "never both").
            return Ok(());
        }

        let field = player.to_lowercase();
        let Some(raw) = self.kv.hash_get(&acceptances_key(match_id), &field).await else {
            // Not a player in this match's roster; ignore silently.
            return Ok(());
        };
        if TrackState::from_str(&raw) != TrackState::Pending {
            // spec §8 "Acceptance idempotence": repeat accepts don't
            // re-advance the count.
            return Ok(());
        }

        self.kv
            .hash_put_all(&acceptances_key(match_id), vec![(field, TrackState::Accepted.as_str().to_string())])
            .await;

        let (accepted, total) = self.accept_counts(match_id).await;
        self.events
            .publish(Event::MatchAcceptance {
                match_id,
                summoner_name: player.clone(),
                accepted,
                total,
            })
            .await;

        if accepted >= total {
            self.resolve_all_accepted(match_id).await?;
        }
        Ok(())
    }

    /// `decline(matchId, player)` (spec §4.5).
    pub async fn decline(&self, match_id: MatchId, player: &SummonerName) -> Result<(), CoreError> {
        let lock = self
            .locker
            .try_lock(
                &format!("lock:match_acceptance:{match_id}"),
                &new_owner("acceptance-coordinator"),
                Duration::from_secs(2),
                Duration::from_secs(10),
            )
            .await
            .ok_or(CoreError::Contended {
                phase: Phase::Acceptance,
                match_id: Some(match_id),
                waited_ms: 2_000,
            })?;

        let result = self.decline_locked(match_id, player, "declined").await;
        lock.release().await;
        result
    }

    async fn decline_locked(
        &self,
        match_id: MatchId,
        player: &SummonerName,
        reason: &str,
    ) -> Result<(), CoreError> {
        let status = self
            .status_of(match_id)
            .await
            .ok_or(CoreError::UnknownMatch { match_id })?;
        if status != TrackStatus::Waiting {
            return Ok(());
        }

        let field = player.to_lowercase();
        if self.kv.hash_get(&acceptances_key(match_id), &field).await.is_none() {
            return Ok(());
        }

        self.kv
            .hash_put_all(&acceptances_key(match_id), vec![(field, TrackState::Declined.as_str().to_string())])
            .await;
        self.set_status(match_id, TrackStatus::Cancelled).await;
        self.resolve_cancelled(match_id, Some(player.clone()), reason).await
    }

    /// All ten accepted: persist the roster into `pickBanData` (already
    /// frozen in SQL at `start`), remove accepted players from the queue
    /// (already gone — the matcher pulled the whole cohort), clear
    /// acceptance tracking, transition `IN_MATCH_FOUND→IN_DRAFT`, and
    /// start the draft (spec §4.5 "All accepted").
    async fn resolve_all_accepted(&self, match_id: MatchId) -> Result<(), CoreError> {
        self.set_status(match_id, TrackStatus::AllAccepted).await;
        let (team1, team2) = self.teams_of(match_id).await;
        let roster: Vec<SummonerName> = team1.iter().chain(team2.iter()).cloned().collect();

        self.sql.update_match_status(match_id, MatchStatus::Draft).await?;

        for player in &roster {
            self.player_state.set(player, PlayerState::InDraft).await?;
        }

        self.clear_tracking(match_id).await;

        info!("match {match_id} fully accepted, starting draft");
        self.draft.start_draft(match_id, team1, team2).await
    }

    /// Any declined or timed-out: cancel the match, drop the
    /// declining/timed-out player from the queue, return the other nine
    /// to the queue with `acceptanceStatus` reset, and transition them
    /// `IN_MATCH_FOUND→IN_QUEUE` (spec §4.5 "Any declined or timed-out").
    async fn resolve_cancelled(
        &self,
        match_id: MatchId,
        declined_player: Option<SummonerName>,
        reason: &str,
    ) -> Result<(), CoreError> {
        let (team1, team2) = self.teams_of(match_id).await;
        let roster: Vec<SummonerName> = team1.iter().chain(team2.iter()).cloned().collect();
        let cohort = self.cohort_of(match_id).await;

        self.ownership.clear_match_players(match_id).await;

        if let Some(declined) = &declined_player {
            self.player_state.set(declined, PlayerState::Available).await.ok();
        }

        let mut requeue = Vec::new();
        for player in &roster {
            if declined_player.as_ref() == Some(player) {
                continue;
            }
            // The registry's transition graph has no direct
            // IN_MATCH_FOUND→IN_QUEUE edge (spec §4.2); the net effect
            // spec §4.5 asks for is reached via the two edges it does
            // allow (InMatchFound→Available, Available→InQueue).
            self.player_state.set(player, PlayerState::Available).await.ok();
            self.player_state.set(player, PlayerState::InQueue).await.ok();
            if let Some(entry) = cohort.iter().find(|e| e.summoner_name.eq_ignore_ascii_case(player)) {
                requeue.push(entry.clone());
            }
        }
        self.queue.requeue(requeue);

        self.sql
            .update_match_status(match_id, MatchStatus::Cancelled)
            .await
            .ok();

        self.expire_tracking(match_id).await;

        self.events
            .publish(Event::MatchCancelled {
                match_id,
                reason: reason.to_string(),
                declined_player: declined_player.clone(),
            })
            .await;
        self.chat.announce_match_cancelled(match_id, reason).await;

        warn!("match {match_id} cancelled ({reason}), declined_player={declined_player:?}");
        Ok(())
    }

    /// 1s ticker (spec §4.5 "Timeout monitor"): treats the first
    /// still-pending player as a decline once the timeout elapses, and
    /// publishes a countdown tick for every still-waiting match.
    pub async fn tick(&self, now_ms: Millis) {
        let active: Vec<MatchId> = self
            .kv
            .set_members(ACTIVE_SET)
            .await
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();

        for match_id in active {
            let Some(status) = self.status_of(match_id).await else {
                self.kv.remove_from_set(ACTIVE_SET, &match_id.to_string()).await;
                continue;
            };
            if status != TrackStatus::Waiting {
                self.kv.remove_from_set(ACTIVE_SET, &match_id.to_string()).await;
                continue;
            }

            let start_time_ms = self
                .kv
                .hash_get(&metadata_key(match_id), "start_time_ms")
                .await
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(now_ms);

            let (accepted, total) = self.accept_counts(match_id).await;
            if let Some(first_pending) = self.first_pending(match_id).await {
                self.events
                    .publish(Event::MatchAcceptance {
                        match_id,
                        summoner_name: first_pending,
                        accepted,
                        total,
                    })
                    .await;
            }

            if now_ms - start_time_ms >= self.timeout_ms {
                let Some(lock) = self
                    .locker
                    .try_lock(
                        &format!("lock:match_acceptance:{match_id}"),
                        &new_owner("acceptance-coordinator"),
                        Duration::from_millis(200),
                        Duration::from_secs(10),
                    )
                    .await
                else {
                    continue;
                };
                if let Some(player) = self.first_pending(match_id).await {
                    if let Err(err) = self.decline_locked(match_id, &player, "timeout").await {
                        warn!("failed to resolve acceptance timeout for match {match_id}: {err}");
                    }
                }
                lock.release().await;
            }
        }
    }

    async fn status_of(&self, match_id: MatchId) -> Option<TrackStatus> {
        self.kv
            .hash_get(&metadata_key(match_id), "status")
            .await
            .map(|s| TrackStatus::from_str(&s))
    }

    async fn set_status(&self, match_id: MatchId, status: TrackStatus) {
        self.kv
            .hash_put_all(&metadata_key(match_id), vec![("status".to_string(), status.as_str().to_string())])
            .await;
    }

    async fn teams_of(&self, match_id: MatchId) -> (Vec<SummonerName>, Vec<SummonerName>) {
        let team1 = self
            .kv
            .hash_get(&metadata_key(match_id), "team1")
            .await
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        let team2 = self
            .kv
            .hash_get(&metadata_key(match_id), "team2")
            .await
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();
        (team1, team2)
    }

    async fn cohort_of(&self, match_id: MatchId) -> Vec<QueueEntry> {
        self.kv
            .hash_get(&metadata_key(match_id), "cohort")
            .await
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    async fn first_pending(&self, match_id: MatchId) -> Option<SummonerName> {
        let (team1, team2) = self.teams_of(match_id).await;
        for player in team1.iter().chain(team2.iter()) {
            let state = self
                .kv
                .hash_get(&acceptances_key(match_id), &player.to_lowercase())
                .await
                .map(|raw| TrackState::from_str(&raw))
                .unwrap_or(TrackState::Pending);
            if state == TrackState::Pending {
                return Some(player.clone());
            }
        }
        None
    }

    async fn accept_counts(&self, match_id: MatchId) -> (usize, usize) {
        let fields = self.kv.hash_get_all(&acceptances_key(match_id)).await;
        let total = fields.len();
        let accepted = fields
            .iter()
            .filter(|(_, v)| TrackState::from_str(v) == TrackState::Accepted)
            .count();
        (accepted, total)
    }

    async fn clear_tracking(&self, match_id: MatchId) {
        self.kv.delete(&acceptances_key(match_id)).await;
        self.kv.delete(&metadata_key(match_id)).await;
        self.kv.remove_from_set(ACTIVE_SET, &match_id.to_string()).await;
    }

    async fn expire_tracking(&self, match_id: MatchId) {
        self.kv.expire(&acceptances_key(match_id), TERMINAL_TTL).await;
        self.kv.expire(&metadata_key(match_id), TERMINAL_TTL).await;
        self.kv.remove_from_set(ACTIVE_SET, &match_id.to_string()).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::adapters::chat_bridge::NullChatBridge;
    use crate::adapters::sql::SeaOrmSqlStore;
    use crate::domain::player::Lane;
    use crate::kv::lock::FairLock;
    use crate::kv::memory::MemoryKv;
    use crate::kv::pubsub::MemoryBus;
    use crate::queue::matcher::SlotPlayer;
    use crate::queue::QueueConfig;
    use sea_orm::{ConnectionTrait, Database, Schema};

    struct RecordingDraftStarter {
        calls: parking_lot::Mutex<Vec<MatchId>>,
    }

    impl RecordingDraftStarter {
        fn new() -> Self {
            RecordingDraftStarter {
                calls: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DraftStarter for RecordingDraftStarter {
        async fn start_draft(
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
        Arc::new(SeaOrmSqlStore::new(db))
    }

    fn slot(name: &str, lane: Lane) -> SlotPlayer {
        SlotPlayer {
            summoner_name: name.to_string(),
            region: "euw".to_string(),
            custom_lp: 0,
            lane,
            autofill: false,
        }
    }

    fn formed() -> FormedMatch {
        let lanes = Lane::SLOT_ORDER;
        FormedMatch {
            team1: (0..5).map(|i| slot(&format!("a{i}"), lanes[i])).collect(),
            team2: (0..5).map(|i| slot(&format!("b{i}"), lanes[i])).collect(),
            average_mmr_team1: 1000.0,
            average_mmr_team2: 1000.0,
        }
    }

    async fn harness() -> (Arc<AcceptanceCoordinator>, Arc<RecordingDraftStarter>) {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let locker: Arc<dyn Locker> = Arc::new(FairLock::new());
        let events = Arc::new(EventBus::new(Arc::new(MemoryBus::new())));
        let player_state = Arc::new(PlayerStateRegistry::new(kv.clone()));
        let ownership = Arc::new(OwnershipMaps::new(kv.clone()));
        let sql = in_memory_sql().await;
        let queue = Arc::new(QueueEngine::new(
            sql.clone(),
            locker.clone(),
            events.clone(),
            player_state.clone(),
            QueueConfig {
                enabled: true,
                min_cohort: 10,
            },
        ));
        let draft = Arc::new(RecordingDraftStarter::new());
        let coordinator = Arc::new(AcceptanceCoordinator::new(
            kv,
            sql,
            locker,
            events,
            player_state,
            ownership,
            queue,
            Arc::new(NullChatBridge),
            draft.clone(),
            30,
            Duration::from_secs(2),
        ));
        (coordinator, draft)
    }

    async fn roster_names(formed: &FormedMatch) -> Vec<SummonerName> {
        formed
            .team1
            .iter()
            .chain(formed.team2.iter())
            .map(|p| p.summoner_name.clone())
            .collect()
    }

    #[tokio::test]
    async fn all_accept_starts_draft() {
        let (coordinator, draft) = harness().await;
        let formed = formed();
        let roster = roster_names(&formed).await;
        coordinator.start(1, formed, vec![], 0).await.unwrap();

        for player in &roster {
            coordinator.accept(1, player).await.unwrap();
        }

        assert_eq!(draft.calls.lock().as_slice(), &[1]);
        for player in &roster {
            assert_eq!(coordinator.player_state.get(player).await, PlayerState::InDraft);
        }
    }

    #[tokio::test]
    async fn double_accept_does_not_advance_count() {
        let (coordinator, _draft) = harness().await;
        let formed = formed();
        let roster = roster_names(&formed).await;
        coordinator.start(1, formed, vec![], 0).await.unwrap();

        coordinator.accept(1, &roster[0]).await.unwrap();
        let (accepted_once, _) = coordinator.accept_counts(1).await;
        coordinator.accept(1, &roster[0]).await.unwrap();
        let (accepted_twice, _) = coordinator.accept_counts(1).await;
        assert_eq!(accepted_once, accepted_twice);
    }

    #[tokio::test]
    async fn decline_cancels_and_requeues_the_rest() {
        let (coordinator, draft) = harness().await;
        let formed = formed();
        let roster = roster_names(&formed).await;
        coordinator.start(1, formed, vec![], 0).await.unwrap();

        for player in &roster[0..7] {
            coordinator.accept(1, player).await.unwrap();
        }
        coordinator.decline(1, &roster[7]).await.unwrap();

        assert!(draft.calls.lock().is_empty());
        assert_eq!(coordinator.player_state.get(&roster[7]).await, PlayerState::Available);
        for player in &roster {
            if player != &roster[7] {
                assert_eq!(coordinator.player_state.get(player).await, PlayerState::InQueue);
            }
        }
    }

    #[tokio::test]
    async fn timeout_tick_treats_first_pending_as_decline() {
        let (coordinator, draft) = harness().await;
        let formed = formed();
        let roster = roster_names(&formed).await;
        coordinator.start(1, formed, vec![], 0).await.unwrap();

        for player in &roster[0..9] {
            coordinator.accept(1, player).await.unwrap();
        }

        coordinator.tick(31_000).await;

        assert!(draft.calls.lock().is_empty());
        assert_eq!(coordinator.player_state.get(&roster[9]).await, PlayerState::Available);
    }
}
