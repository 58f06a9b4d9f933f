//! SeaORM entity for `players` (spec §3 "Player", §6 "SQL surface").

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "players")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub summoner_name: String,
    pub game_name: String,
    pub tag_line: String,
    pub region: String,
    pub custom_lp: i64,
    pub primary_lane: String,
    pub secondary_lane: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
