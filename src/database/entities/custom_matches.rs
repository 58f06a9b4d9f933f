//! SeaORM entity for `custom_matches` (spec §6 "SQL surface"). JSON blob
//! columns hold the roster/pick-ban snapshots; the core is the only
//! reader/writer of their shape, so they are stored as plain `TEXT`
//! rather than modelled relationally, matching the spec's external SQL
//! surface exactly.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "custom_matches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub status: String,
    pub team1_players_json: String,
    pub team2_players_json: String,
    pub average_mmr_team1: f64,
    pub average_mmr_team2: f64,
    pub pick_ban_data_json: Option<String>,
    pub winner_team: Option<i32>,
    pub actual_winner: Option<i32>,
    pub actual_duration: Option<i64>,
    pub lp_changes_json: Option<String>,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
