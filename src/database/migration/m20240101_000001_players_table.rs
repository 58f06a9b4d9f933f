//! Migration logic for generating the `players` table.
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Players::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Players::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Players::SummonerName).string_len(64).not_null())
                    .col(ColumnDef::new(Players::GameName).string_len(64).not_null())
                    .col(ColumnDef::new(Players::TagLine).string_len(8).not_null())
                    .col(ColumnDef::new(Players::Region).string_len(8).not_null())
                    .col(ColumnDef::new(Players::CustomLp).big_integer().default(0).not_null())
                    .col(ColumnDef::new(Players::PrimaryLane).string_len(16).not_null())
                    .col(ColumnDef::new(Players::SecondaryLane).string_len(16).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_players_summoner_name")
                    .table(Players::Table)
                    .col(Players::SummonerName)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Players::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Players {
    Table,
    Id,
    SummonerName,
    GameName,
    TagLine,
    Region,
    CustomLp,
    PrimaryLane,
    SecondaryLane,
}
