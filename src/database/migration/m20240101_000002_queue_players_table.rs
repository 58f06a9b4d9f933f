//! Migration logic for generating the `queue_players` table.
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QueuePlayers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QueuePlayers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QueuePlayers::PlayerId).integer().not_null())
                    .col(ColumnDef::new(QueuePlayers::SummonerName).string_len(64).not_null())
                    .col(ColumnDef::new(QueuePlayers::Region).string_len(8).not_null())
                    .col(ColumnDef::new(QueuePlayers::CustomLp).big_integer().default(0).not_null())
                    .col(ColumnDef::new(QueuePlayers::PrimaryLane).string_len(16).not_null())
                    .col(ColumnDef::new(QueuePlayers::SecondaryLane).string_len(16).not_null())
                    .col(
                        ColumnDef::new(QueuePlayers::AcceptanceStatus)
                            .tiny_integer()
                            .default(0)
                            .not_null(),
                    )
                    .col(ColumnDef::new(QueuePlayers::JoinTime).big_integer().not_null())
                    .col(ColumnDef::new(QueuePlayers::QueuePosition).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_queue_players_summoner_name")
                    .table(QueuePlayers::Table)
                    .col(QueuePlayers::SummonerName)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QueuePlayers::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum QueuePlayers {
    Table,
    Id,
    PlayerId,
    SummonerName,
    Region,
    CustomLp,
    PrimaryLane,
    SecondaryLane,
    AcceptanceStatus,
    JoinTime,
    QueuePosition,
}
