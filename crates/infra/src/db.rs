//! Postgres connection pool and schema migrations.

use std::time::Duration;

pub use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::config::DatabaseConfig;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    tracing::info!(
        max_connections = config.max_connections,
        "connecting to database"
    );
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.url)
        .await?;
    tracing::info!("database connection established");
    Ok(pool)
}

/// Apply `migrations/*.sql` that have not run yet.
pub async fn migrate(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("migrations completed");
    Ok(())
}
