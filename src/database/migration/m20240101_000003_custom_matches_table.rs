//! Migration logic for generating the `custom_matches` table.
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CustomMatches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CustomMatches::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CustomMatches::Status).string_len(16).not_null())
                    .col(ColumnDef::new(CustomMatches::Team1PlayersJson).text().not_null())
                    .col(ColumnDef::new(CustomMatches::Team2PlayersJson).text().not_null())
                    .col(ColumnDef::new(CustomMatches::AverageMmrTeam1).double().not_null())
                    .col(ColumnDef::new(CustomMatches::AverageMmrTeam2).double().not_null())
                    .col(ColumnDef::new(CustomMatches::PickBanDataJson).text().null())
                    .col(ColumnDef::new(CustomMatches::WinnerTeam).integer().null())
                    .col(ColumnDef::new(CustomMatches::ActualWinner).integer().null())
                    .col(ColumnDef::new(CustomMatches::ActualDuration).big_integer().null())
                    .col(ColumnDef::new(CustomMatches::LpChangesJson).text().null())
                    .col(ColumnDef::new(CustomMatches::CompletedAt).big_integer().null())
                    .col(ColumnDef::new(CustomMatches::UpdatedAt).big_integer().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CustomMatches::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum CustomMatches {
    Table,
    Id,
    Status,
    Team1PlayersJson,
    Team2PlayersJson,
    AverageMmrTeam1,
    AverageMmrTeam2,
    PickBanDataJson,
    WinnerTeam,
    ActualWinner,
    ActualDuration,
    LpChangesJson,
    CompletedAt,
    UpdatedAt,
}
