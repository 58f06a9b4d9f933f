//! SeaORM entity for `queue_players` (spec §6 "SQL surface").

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "queue_players")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub player_id: i32,
    pub summoner_name: String,
    pub region: String,
    pub custom_lp: i64,
    pub primary_lane: String,
    pub secondary_lane: String,
    /// 0=idle, -1=awaiting, 1=accepted, 2=declined (spec §3 "QueueEntry").
    pub acceptance_status: i8,
    pub join_time: i64,
    pub queue_position: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
