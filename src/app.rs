//! Application bootstrap (spec §9 "Bootstrap"): wires every component
//! (C1-C10) into one shared `AppState`, grounded on the teacher's
//! `Services` aggregator (`services/mod.rs`) that builds each subsystem
//! once at startup and hands `Arc` clones to whatever needs them.

use crate::acceptance::AcceptanceCoordinator;
use crate::adapters::chat_bridge::NullChatBridge;
use crate::adapters::game_client::NullGameClientBridge;
use crate::adapters::ranked_data::{DisabledRankedDataClient, HttpRankedDataClient, RankedDataClient};
use crate::adapters::sql::SeaOrmSqlStore;
use crate::adapters::{ChatBridge, GameClientBridge, SqlStore};
use crate::config::Config;
use crate::draft::DraftEngine;
use crate::events::EventBus;
use crate::game::GameMonitor;
use crate::janitor::Janitor;
use crate::kv::lock::FairLock;
use crate::kv::memory::MemoryKv;
use crate::kv::pubsub::MemoryBus;
use crate::kv::{KvStore, Locker};
use crate::queue::{QueueConfig, QueueEngine};
use crate::registry::{OwnershipMaps, PlayerLockRegistry, PlayerStateRegistry, SessionRegistry};
use sea_orm::DbErr;
use std::sync::Arc;
use std::time::Duration;

/// Every shared component a request handler or periodic ticker might
/// need, built once in [`AppState::init`] and cloned (cheaply, via `Arc`)
/// wherever it's required. Mirrors the teacher's `Services` struct shape.
pub struct AppState {
    pub config: Arc<Config>,
    pub kv: Arc<dyn KvStore>,
    pub locker: Arc<dyn Locker>,
    pub events: Arc<EventBus>,
    pub player_state: Arc<PlayerStateRegistry>,
    pub ownership: Arc<OwnershipMaps>,
    pub sessions: Arc<SessionRegistry>,
    pub player_lock: Arc<PlayerLockRegistry>,
    pub sql: Arc<dyn SqlStore>,
    pub ranked_data: Arc<dyn RankedDataClient>,
    pub queue: Arc<QueueEngine>,
    pub acceptance: Arc<AcceptanceCoordinator>,
    pub draft: Arc<DraftEngine>,
    pub game: Arc<GameMonitor>,
    pub janitor: Arc<Janitor>,
}

impl AppState {
    /// Connects to SQL, constructs every in-process component and wires
    /// the cross-component driver interfaces (`DraftStarter`,
    /// `GameStarter`) together. Order matters: the game monitor has no
    /// dependency on anything built after it, the draft engine needs the
    /// game monitor, and the acceptance coordinator needs both the draft
    /// engine and the queue.
    pub async fn init(config: Config) -> Result<Self, DbErr> {
        let db = crate::database::connect(&config.database_file).await?;
        let sql: Arc<dyn SqlStore> = Arc::new(SeaOrmSqlStore::new(db));

        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let locker: Arc<dyn Locker> = Arc::new(FairLock::new());
        let events = Arc::new(EventBus::new(Arc::new(MemoryBus::new())));
        let player_state = Arc::new(PlayerStateRegistry::new(kv.clone()));
        let ownership = Arc::new(OwnershipMaps::new(kv.clone()));
        let sessions = Arc::new(SessionRegistry::new());
        let player_lock = Arc::new(PlayerLockRegistry::new(kv.clone(), config.player_lock.ttl_hours));

        let chat: Arc<dyn ChatBridge> = Arc::new(NullChatBridge);
        let game_client: Arc<dyn GameClientBridge> = Arc::new(NullGameClientBridge);
        let ranked_data: Arc<dyn RankedDataClient> = if config.ranked_data.enabled {
            Arc::new(HttpRankedDataClient::new(config.ranked_data.base_url.clone()))
        } else {
            Arc::new(DisabledRankedDataClient)
        };

        let queue = Arc::new(QueueEngine::new(
            sql.clone(),
            locker.clone(),
            events.clone(),
            player_state.clone(),
            QueueConfig {
                enabled: config.queue.enabled,
                min_cohort: config.queue.min_cohort,
            },
        ));
        queue.load_from_sql().await.map_err(|err| {
            DbErr::Custom(format!("failed to rebuild queue from sql: {err}"))
        })?;

        let game = Arc::new(GameMonitor::new(
            kv.clone(),
            sql.clone(),
            locker.clone(),
            events.clone(),
            player_state.clone(),
            ownership.clone(),
            chat.clone(),
            game_client.clone(),
            config.game.timeout_ms,
        ));

        let draft = Arc::new(DraftEngine::new(
            kv.clone(),
            sql.clone(),
            locker.clone(),
            events.clone(),
            game.clone(),
            config.draft.action_timeout_ms,
            config.draft.confirmation_timeout_seconds,
        ));

        let acceptance = Arc::new(AcceptanceCoordinator::new(
            kv.clone(),
            sql.clone(),
            locker.clone(),
            events.clone(),
            player_state.clone(),
            ownership.clone(),
            queue.clone(),
            chat.clone(),
            draft.clone(),
            config.acceptance.timeout_seconds,
            Duration::from_millis(config.bot.auto_accept_delay_ms),
        ));

        let janitor = Arc::new(Janitor::new(
            kv.clone(),
            sql.clone(),
            player_state.clone(),
            ownership.clone(),
        ));

        Ok(AppState {
            config: Arc::new(config),
            kv,
            locker,
            events,
            player_state,
            ownership,
            sessions,
            player_lock,
            sql,
            ranked_data,
            queue,
            acceptance,
            draft,
            game,
            janitor,
        })
    }

    /// Spawns every periodic ticker the coordination core needs (spec
    /// §4.4 matcher loop, §4.5/§4.6/§4.7 timeout monitors, §4.9 janitor
    /// sweep). Each loop is a plain `tokio::spawn` over a
    /// `tokio::time::interval`, the same shape the teacher uses for its
    /// tunnel keep-alive task.
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        self.spawn_matcher_loop();
        self.spawn_acceptance_tick();
        self.spawn_draft_tick();
        self.spawn_game_tick();
        self.spawn_janitor_sweep();
    }

    fn spawn_matcher_loop(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                match this.queue.try_form_match().await {
                    Ok(Some((formed, cohort))) => {
                        let match_id = this.next_match_id();
                        if let Err(err) = this
                            .acceptance
                            .start(match_id, formed, cohort, now_ms())
                            .await
                        {
                            log::warn!("failed to start acceptance for match {match_id}: {err}");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => log::warn!("team-formation loop error: {err}"),
                }
            }
        });
    }

    fn spawn_acceptance_tick(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                this.acceptance.tick(now_ms()).await;
            }
        });
    }

    fn spawn_draft_tick(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                this.draft.tick().await;
            }
        });
    }

    fn spawn_game_tick(self: &Arc<Self>) {
        let this = self.clone();
        let period = Duration::from_millis(self.config.game.monitoring_interval_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                this.game.tick().await;
            }
        });
    }

    fn spawn_janitor_sweep(self: &Arc<Self>) {
        let this = self.clone();
        let period = Duration::from_millis(self.config.janitor.interval_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                this.janitor.sweep().await;
            }
        });
    }

    /// Match ids are just the current millisecond timestamp combined with
    /// an in-process counter to stay unique even when two matches form in
    /// the same tick; SQL's primary key is the real source of truth once
    /// `insert_match` runs.
    fn next_match_id(&self) -> crate::types::MatchId {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let now = now_ms() as u64;
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        (now << 16) | (seq & 0xFFFF)
    }
}

fn now_ms() -> crate::types::Millis {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as crate::types::Millis)
        .unwrap_or(0)
}
