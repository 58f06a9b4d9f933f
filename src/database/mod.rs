//! SQL surface (spec §6 "SQL surface (external)"). The core consumes and
//! writes `queue_players`, `custom_matches` and `players` but owns no
//! schema migrations beyond what it needs to run standalone for local
//! development — grounded on the teacher's `database::connect()`
//! (`src/database/mod.rs`).

pub mod entities;
pub mod migration;

use log::info;
use migration::{Migrator, MigratorTrait};
use sea_orm::{DatabaseConnection, DbErr};
use std::path::Path;
use tokio::fs::{create_dir_all, File};

pub async fn connect(database_file: &str) -> Result<DatabaseConnection, DbErr> {
    info!("connecting to database..");

    let file_path = Path::new(database_file);
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            create_dir_all(parent)
                .await
                .map_err(|err| DbErr::Custom(format!("unable to create database dir: {err}")))?;
        }
    }

    if !file_path.exists() {
        File::create(file_path)
            .await
            .map_err(|err| DbErr::Custom(format!("unable to create database file: {err}")))?;
    }

    let connection_string = format!("sqlite:{database_file}");
    let connection = sea_orm::Database::connect(&connection_string).await?;

    info!("running migrations...");
    Migrator::up(&connection, None).await?;
    info!("migrations complete");

    Ok(connection)
}
