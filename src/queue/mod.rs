//! Queue engine (spec §4.4, component C4): admission, lane preferences,
//! and the team-formation handoff into C5.

pub mod matcher;

use crate::adapters::SqlStore;
use crate::domain::player::Lane;
use crate::domain::queue_entry::{AcceptanceStatus, QueueEntry};
use crate::error::CoreError;
use crate::events::{Event, EventBus};
use crate::kv::lock::new_owner;
use crate::kv::Locker;
use crate::registry::player_state::{PlayerState, PlayerStateRegistry};
use crate::types::{Millis, SummonerName};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is disabled")]
    NotConfigured,
    #[error("{0} is already in the queue")]
    AlreadyInQueue(SummonerName),
    #[error("queue join conflicts with current player state")]
    StateConflict,
    #[error("fewer than ten idle entries after acquiring the matcher lock")]
    IncompleteCohort,
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub struct QueueConfig {
    pub enabled: bool,
    pub min_cohort: usize,
}

/// Admission surface and in-process mirror of the queue used by the
/// matcher loop. SQL is the system of record (spec §4.4 step 3: "upsert
/// QueueEntry in SQL"); the in-memory `entries` map is this replica's
/// working copy, rebuilt from SQL on startup by the adapters layer.
pub struct QueueEngine {
    sql: Arc<dyn SqlStore>,
    locker: Arc<dyn Locker>,
    events: Arc<EventBus>,
    player_state: Arc<PlayerStateRegistry>,
    config: QueueConfig,
    entries: Mutex<HashMap<SummonerName, QueueEntry>>,
}

impl QueueEngine {
    pub fn new(
        sql: Arc<dyn SqlStore>,
        locker: Arc<dyn Locker>,
        events: Arc<EventBus>,
        player_state: Arc<PlayerStateRegistry>,
        config: QueueConfig,
    ) -> Self {
        QueueEngine {
            sql,
            locker,
            events,
            player_state,
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Rebuilds the in-memory mirror from SQL on startup (spec §9.1
    /// "Global mutable state": ephemeral state must be reconstructible).
    pub async fn load_from_sql(&self) -> Result<(), QueueError> {
        let rows = self.sql.load_queue_players().await?;
        let mut entries = self.entries.lock();
        for row in rows {
            entries.insert(row.summoner_name.clone(), row);
        }
        Ok(())
    }

    /// `join(player, primary, secondary)` (spec §4.4 "Admission").
    pub async fn join(
        &self,
        player: &SummonerName,
        region: &str,
        custom_lp: i64,
        primary: Lane,
        secondary: Lane,
        now_ms: Millis,
    ) -> Result<(), QueueError> {
        if !self.config.enabled {
            return Err(QueueError::NotConfigured);
        }

        let lock = self
            .locker
            .try_lock(
                &format!("lock:queue:join:{}", player.to_lowercase()),
                &new_owner("queue-join"),
                Duration::from_secs(2),
                Duration::from_secs(5),
            )
            .await
            .ok_or_else(|| {
                QueueError::Core(CoreError::Contended {
                    phase: crate::error::Phase::Queue,
                    match_id: None,
                    waited_ms: 2_000,
                })
            })?;

        let state = self.player_state.get(player).await;
        if !matches!(state, PlayerState::Available | PlayerState::InQueue) {
            return Err(QueueError::StateConflict);
        }

        let entry = {
            let mut entries = self.entries.lock();
            if entries.contains_key(player) {
                return Err(QueueError::AlreadyInQueue(player.clone()));
            }
            let queue_position = entries.len();
            let entry = QueueEntry {
                summoner_name: player.clone(),
                region: region.to_string(),
                custom_lp,
                primary_lane: primary,
                secondary_lane: secondary,
                join_time: now_ms,
                queue_position,
                acceptance_status: AcceptanceStatus::Idle,
            };
            entries.insert(player.clone(), entry.clone());
            entry
        };

        // spec §4.4 step 3: "Upsert QueueEntry in SQL; reset acceptanceStatus=0".
        self.sql.upsert_queue_player(&entry).await?;

        self.player_state.set(player, PlayerState::InQueue).await?;
        self.events
            .publish(Event::QueuePlayerJoined {
                summoner_name: player.clone(),
            })
            .await;
        self.publish_update().await;
        lock.release().await;
        Ok(())
    }

    /// `leave(player)`, symmetric to `join` (spec §4.4).
    pub async fn leave(&self, player: &SummonerName) -> Result<(), QueueError> {
        let removed = self.entries.lock().remove(player).is_some();
        if !removed {
            return Ok(());
        }
        self.sql.delete_queue_player(player).await?;
        self.player_state.set(player, PlayerState::Available).await?;
        self.events
            .publish(Event::QueuePlayerLeft {
                summoner_name: player.clone(),
            })
            .await;
        self.publish_update().await;
        Ok(())
    }

    pub fn idle_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|e| e.is_idle())
            .count()
    }

    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.entries.lock().values().cloned().collect()
    }

    /// Removes and returns an idle cohort if at least `min_cohort` idle
    /// entries exist, sorted by `joinTime` (spec §4.4 step 1). Callers
    /// must already hold `lock:queue:matcher`.
    pub fn take_idle_cohort(&self) -> Option<Vec<QueueEntry>> {
        let mut entries = self.entries.lock();
        let mut idle: Vec<QueueEntry> = entries
            .values()
            .filter(|e| e.is_idle())
            .cloned()
            .collect();
        if idle.len() < self.config.min_cohort {
            return None;
        }
        idle.sort_by_key(|e| e.join_time);
        idle.truncate(self.config.min_cohort);
        for entry in &idle {
            entries.remove(&entry.summoner_name);
        }
        Some(idle)
    }

    /// Returns the removed cohort to the queue with `acceptanceStatus`
    /// reset to idle (used when acceptance cancels before draft starts).
    pub fn requeue(&self, mut cohort: Vec<QueueEntry>) {
        let mut entries = self.entries.lock();
        for entry in cohort.iter_mut() {
            entry.acceptance_status = AcceptanceStatus::Idle;
        }
        for entry in cohort {
            entries.insert(entry.summoner_name.clone(), entry);
        }
    }

    async fn publish_update(&self) {
        let snapshot = self.snapshot();
        debug!("queue now has {} entries", snapshot.len());
        self.events
            .publish(Event::QueueUpdate {
                players_in_queue: snapshot.len(),
            })
            .await;
    }

    /// Runs one iteration of the team-formation loop under
    /// `lock:queue:matcher` (spec §4.4 "Team formation loop"). Intended to
    /// be invoked by a periodic ticker owned by the app bootstrap. Returns
    /// the formed match alongside the original (pre-lane-assignment)
    /// cohort, which the acceptance coordinator (C5) retains so it can
    /// reconstruct `QueueEntry` rows if the match is later cancelled.
    pub async fn try_form_match(
        &self,
    ) -> Result<Option<(matcher::FormedMatch, Vec<QueueEntry>)>, QueueError> {
        let lock = self
            .locker
            .try_lock(
                "lock:queue:matcher",
                &new_owner("queue-matcher"),
                Duration::from_secs(1),
                Duration::from_secs(10),
            )
            .await;
        let Some(lock) = lock else {
            return Ok(None);
        };

        if self.idle_count() < self.config.min_cohort {
            lock.release().await;
            return Ok(None);
        }

        let Some(cohort) = self.take_idle_cohort() else {
            lock.release().await;
            return Err(QueueError::IncompleteCohort);
        };

        let formed = match matcher::form_teams(cohort.clone()) {
            Some(formed) => formed,
            None => {
                // Should not happen once admission guarantees five lanes
                // worth of players exist, but fail safe by requeuing.
                self.requeue(cohort);
                lock.release().await;
                return Err(QueueError::IncompleteCohort);
            }
        };

        for player in formed.team1.iter().chain(formed.team2.iter()) {
            if let Err(err) = self.sql.delete_queue_player(&player.summoner_name).await {
                warn!("failed to delete matched player {} from SQL queue: {err}", player.summoner_name);
            }
        }

        info!(
            "formed match from cohort of {} players",
            formed.team1.len() + formed.team2.len()
        );
        lock.release().await;
        Ok(Some((formed, cohort)))
    }
}
