//! Database layer for civica.
//!
//! Entities and repositories for categories, proposals, attachments and
//! proposal votes, plus the migrations that create them.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use civica_common::{AppError, Config, DatabaseConfig};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::log::LevelFilter;

/// Initialize database connection.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    connect(&config.database).await
}

/// Open a connection pool with the given settings.
pub async fn connect(database: &DatabaseConfig) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(&database.url);

    opt.max_connections(database.max_connections)
        .min_connections(database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Roll back the `steps` most recent migrations.
pub async fn rollback(db: &DatabaseConnection, steps: u32) -> Result<(), AppError> {
    migrations::Migrator::down(db, Some(steps))
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Names of migrations not yet applied.
pub async fn pending_migrations(db: &DatabaseConnection) -> Result<Vec<String>, AppError> {
    let pending = migrations::Migrator::get_pending_migrations(db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(pending.iter().map(|m| m.name().to_string()).collect())
}
