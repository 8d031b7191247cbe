use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::info;

pub fn database_url() -> String {
    std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://challenge_streaks.db?mode=rwc".to_string())
}

pub async fn connect_to_database() -> Result<DatabaseConnection, DbErr> {
    Database::connect(&database_url()).await
}

/// Every pooled connection to `sqlite::memory:` would get its own empty
/// database, so the pool is pinned to one connection.
pub async fn connect_to_memory_database() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1);
    Database::connect(options).await
}

pub async fn connect_and_migrate() -> Result<DatabaseConnection, DbErr> {
    let db = connect_to_database().await?;
    info!("Running database migrations");
    Migrator::up(&db, None).await?;
    Ok(db)
}
