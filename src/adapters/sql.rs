//! SQL surface driver interface (spec §6 "SQL surface (external)").
//!
//! The core treats SQL as the authoritative record for `Match.status`
//! (I7) and the queue, but owns no migrations beyond what it needs to run
//! standalone (see `database::migration`). Grounded on the teacher's
//! `database::entities::players::Model` active-record style methods.

use crate::domain::draft::DraftState;
use crate::domain::match_record::{Match, MatchStatus};
use crate::domain::player::{Lane, Player};
use crate::domain::queue_entry::{AcceptanceStatus, QueueEntry};
use crate::error::CoreError;
use crate::types::{MatchId, Millis, SummonerName};
use crate::database::entities::{custom_matches, players, queue_players};
use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

#[async_trait]
pub trait SqlStore: Send + Sync {
    async fn upsert_queue_player(&self, entry: &QueueEntry) -> Result<(), CoreError>;
    async fn delete_queue_player(&self, summoner_name: &str) -> Result<(), CoreError>;
    async fn load_queue_players(&self) -> Result<Vec<QueueEntry>, CoreError>;

    async fn insert_match(&self, match_record: &Match) -> Result<(), CoreError>;
    async fn load_match(&self, match_id: MatchId) -> Result<Option<Match>, CoreError>;
    async fn update_match_status(
        &self,
        match_id: MatchId,
        status: MatchStatus,
    ) -> Result<(), CoreError>;

    /// Merges the draft snapshot into `pick_ban_data_json` without
    /// touching the roster JSON blocks (spec §4.6 step 6: "never
    /// overwrite them").
    async fn merge_pick_ban_data(
        &self,
        match_id: MatchId,
        draft: &DraftState,
    ) -> Result<(), CoreError>;

    async fn finalize_match(
        &self,
        match_id: MatchId,
        winner_team: u8,
        actual_duration_ms: Millis,
        lp_changes: Vec<(SummonerName, i64)>,
    ) -> Result<(), CoreError>;

    async fn delete_match(&self, match_id: MatchId) -> Result<(), CoreError>;

    async fn upsert_player(&self, player: &Player) -> Result<(), CoreError>;
    async fn load_player(&self, summoner_name: &str) -> Result<Option<Player>, CoreError>;
}

fn downstream(what: &'static str, err: impl std::error::Error + Send + Sync + 'static) -> CoreError {
    CoreError::DownstreamUnavailable {
        what,
        source: Box::new(err),
    }
}

fn lane_to_string(lane: Lane) -> String {
    serde_json::to_value(lane)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "fill".to_string())
}

fn lane_from_string(s: &str) -> Lane {
    serde_json::from_value(serde_json::Value::String(s.to_string())).unwrap_or(Lane::Fill)
}

fn status_to_string(status: MatchStatus) -> String {
    match status {
        MatchStatus::MatchFound => "match_found",
        MatchStatus::Draft => "draft",
        MatchStatus::InProgress => "in_progress",
        MatchStatus::Completed => "completed",
        MatchStatus::Cancelled => "cancelled",
    }
    .to_string()
}

fn status_from_string(s: &str) -> MatchStatus {
    match s {
        "draft" => MatchStatus::Draft,
        "in_progress" => MatchStatus::InProgress,
        "completed" => MatchStatus::Completed,
        "cancelled" => MatchStatus::Cancelled,
        _ => MatchStatus::MatchFound,
    }
}

/// SeaORM-backed implementation of [`SqlStore`], mirroring the teacher's
/// `Model::by_id`/`Model::create`/`into_active_model` active-record idiom.
pub struct SeaOrmSqlStore {
    db: DatabaseConnection,
}

impl SeaOrmSqlStore {
    pub fn new(db: DatabaseConnection) -> Self {
        SeaOrmSqlStore { db }
    }
}

#[async_trait]
impl SqlStore for SeaOrmSqlStore {
    async fn upsert_queue_player(&self, entry: &QueueEntry) -> Result<(), CoreError> {
        let existing = queue_players::Entity::find()
            .filter(queue_players::Column::SummonerName.eq(entry.summoner_name.clone()))
            .one(&self.db)
            .await
            .map_err(|e| downstream("sql:queue_players", e))?;

        let model = queue_players::ActiveModel {
            id: existing.as_ref().map(|m| Set(m.id)).unwrap_or_default(),
            player_id: Set(0),
            summoner_name: Set(entry.summoner_name.clone()),
            region: Set(entry.region.clone()),
            custom_lp: Set(entry.custom_lp),
            primary_lane: Set(lane_to_string(entry.primary_lane)),
            secondary_lane: Set(lane_to_string(entry.secondary_lane)),
            acceptance_status: Set(entry.acceptance_status.as_i8()),
            join_time: Set(entry.join_time),
            queue_position: Set(entry.queue_position as i32),
        };

        if existing.is_some() {
            model.update(&self.db).await
        } else {
            model.insert(&self.db).await
        }
        .map(|_| ())
        .map_err(|e| downstream("sql:queue_players", e))
    }

    async fn delete_queue_player(&self, summoner_name: &str) -> Result<(), CoreError> {
        queue_players::Entity::delete_many()
            .filter(queue_players::Column::SummonerName.eq(summoner_name))
            .exec(&self.db)
            .await
            .map(|_| ())
            .map_err(|e| downstream("sql:queue_players", e))
    }

    async fn load_queue_players(&self) -> Result<Vec<QueueEntry>, CoreError> {
        let rows = queue_players::Entity::find()
            .all(&self.db)
            .await
            .map_err(|e| downstream("sql:queue_players", e))?;
        Ok(rows
            .into_iter()
            .map(|row| QueueEntry {
                summoner_name: row.summoner_name,
                region: row.region,
                custom_lp: row.custom_lp,
                primary_lane: lane_from_string(&row.primary_lane),
                secondary_lane: lane_from_string(&row.secondary_lane),
                join_time: row.join_time,
                queue_position: row.queue_position as usize,
                acceptance_status: AcceptanceStatus::from_i8(row.acceptance_status)
                    .unwrap_or(AcceptanceStatus::Idle),
            })
            .collect())
    }

    async fn insert_match(&self, match_record: &Match) -> Result<(), CoreError> {
        let model = custom_matches::ActiveModel {
            id: Set(match_record.match_id as i64),
            status: Set(status_to_string(match_record.status)),
            team1_players_json: Set(serde_json::to_string(&match_record.team1_players).unwrap_or_default()),
            team2_players_json: Set(serde_json::to_string(&match_record.team2_players).unwrap_or_default()),
            average_mmr_team1: Set(match_record.average_mmr_team1),
            average_mmr_team2: Set(match_record.average_mmr_team2),
            pick_ban_data_json: Set(None),
            winner_team: Set(None),
            actual_winner: Set(None),
            actual_duration: Set(None),
            lp_changes_json: Set(None),
            completed_at: Set(None),
            updated_at: Set(match_record.created_at),
        };
        model
            .insert(&self.db)
            .await
            .map(|_| ())
            .map_err(|e| downstream("sql:custom_matches", e))
    }

    async fn load_match(&self, match_id: MatchId) -> Result<Option<Match>, CoreError> {
        let row = custom_matches::Entity::find_by_id(match_id as i64)
            .one(&self.db)
            .await
            .map_err(|e| downstream("sql:custom_matches", e))?;

        Ok(row.map(|row| Match {
            match_id: row.id as u64,
            status: status_from_string(&row.status),
            team1_players: serde_json::from_str(&row.team1_players_json).unwrap_or_default(),
            team2_players: serde_json::from_str(&row.team2_players_json).unwrap_or_default(),
            average_mmr_team1: row.average_mmr_team1,
            average_mmr_team2: row.average_mmr_team2,
            pick_ban_data: row
                .pick_ban_data_json
                .and_then(|json| serde_json::from_str(&json).ok()),
            winner_team: row.winner_team.map(|w| w as u8),
            actual_duration_ms: row.actual_duration,
            lp_changes: row
                .lp_changes_json
                .and_then(|json| serde_json::from_str(&json).ok()),
            created_at: row.updated_at,
            started_at: None,
            completed_at: row.completed_at,
        }))
    }

    async fn update_match_status(
        &self,
        match_id: MatchId,
        status: MatchStatus,
    ) -> Result<(), CoreError> {
        let Some(row) = custom_matches::Entity::find_by_id(match_id as i64)
            .one(&self.db)
            .await
            .map_err(|e| downstream("sql:custom_matches", e))?
        else {
            return Err(CoreError::UnknownMatch { match_id });
        };
        let mut model: custom_matches::ActiveModel = row.into();
        model.status = Set(status_to_string(status));
        model
            .update(&self.db)
            .await
            .map(|_| ())
            .map_err(|e| downstream("sql:custom_matches", e))
    }

    async fn merge_pick_ban_data(
        &self,
        match_id: MatchId,
        draft: &DraftState,
    ) -> Result<(), CoreError> {
        let Some(row) = custom_matches::Entity::find_by_id(match_id as i64)
            .one(&self.db)
            .await
            .map_err(|e| downstream("sql:custom_matches", e))?
        else {
            return Err(CoreError::UnknownMatch { match_id });
        };
        let mut model: custom_matches::ActiveModel = row.into();
        model.pick_ban_data_json = Set(Some(
            serde_json::to_string(&draft.actions).unwrap_or_default(),
        ));
        model
            .update(&self.db)
            .await
            .map(|_| ())
            .map_err(|e| downstream("sql:custom_matches", e))
    }

    async fn finalize_match(
        &self,
        match_id: MatchId,
        winner_team: u8,
        actual_duration_ms: Millis,
        lp_changes: Vec<(SummonerName, i64)>,
    ) -> Result<(), CoreError> {
        let Some(row) = custom_matches::Entity::find_by_id(match_id as i64)
            .one(&self.db)
            .await
            .map_err(|e| downstream("sql:custom_matches", e))?
        else {
            return Err(CoreError::UnknownMatch { match_id });
        };
        if row.status == "completed" {
            // Idempotent finalisation (spec §7: "Conflict in finish is
            // swallowed ... a second attempt finds completed and returns").
            return Ok(());
        }
        let mut model: custom_matches::ActiveModel = row.into();
        model.status = Set("completed".to_string());
        model.winner_team = Set(Some(winner_team as i32));
        model.actual_winner = Set(Some(winner_team as i32));
        model.actual_duration = Set(Some(actual_duration_ms));
        model.lp_changes_json = Set(Some(serde_json::to_string(&lp_changes).unwrap_or_default()));
        model
            .update(&self.db)
            .await
            .map(|_| ())
            .map_err(|e| downstream("sql:custom_matches", e))
    }

    async fn delete_match(&self, match_id: MatchId) -> Result<(), CoreError> {
        custom_matches::Entity::delete_by_id(match_id as i64)
            .exec(&self.db)
            .await
            .map(|_| ())
            .map_err(|e| downstream("sql:custom_matches", e))
    }

    async fn upsert_player(&self, player: &Player) -> Result<(), CoreError> {
        let existing = players::Entity::find()
            .filter(players::Column::SummonerName.eq(player.summoner_name.clone()))
            .one(&self.db)
            .await
            .map_err(|e| downstream("sql:players", e))?;

        let model = players::ActiveModel {
            id: existing.as_ref().map(|m| Set(m.id)).unwrap_or_default(),
            summoner_name: Set(player.summoner_name.clone()),
            game_name: Set(player.game_name.clone()),
            tag_line: Set(player.tag_line.clone()),
            region: Set(player.region.clone()),
            custom_lp: Set(player.custom_lp),
            primary_lane: Set(lane_to_string(player.primary_lane)),
            secondary_lane: Set(lane_to_string(player.secondary_lane)),
        };

        if existing.is_some() {
            model.update(&self.db).await
        } else {
            model.insert(&self.db).await
        }
        .map(|_| ())
        .map_err(|e| downstream("sql:players", e))
    }

    async fn load_player(&self, summoner_name: &str) -> Result<Option<Player>, CoreError> {
        let row = players::Entity::find()
            .filter(players::Column::SummonerName.eq(summoner_name))
            .one(&self.db)
            .await
            .map_err(|e| downstream("sql:players", e))?;
        Ok(row.map(|row| Player {
            summoner_name: row.summoner_name,
            game_name: row.game_name,
            tag_line: row.tag_line,
            region: row.region,
            custom_lp: row.custom_lp,
            primary_lane: lane_from_string(&row.primary_lane),
            secondary_lane: lane_from_string(&row.secondary_lane),
        }))
    }
}
