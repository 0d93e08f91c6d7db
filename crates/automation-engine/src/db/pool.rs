//! Database connection pool management.

use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Type alias for the PostgreSQL connection pool.
pub type DbPool = PgPool;

/// Create a new database connection pool.
///
/// Every connection gets `search_path` set to `schema`, so queries can use
/// unqualified table names regardless of where the tenant tables live.
///
/// # Errors
///
/// Returns an error if the connection options are invalid or the pool
/// cannot be created.
pub async fn create_pool(config: &DatabaseConfig, schema: &str) -> Result<DbPool, sqlx::Error> {
    let options = config
        .connect_options()?
        .options([("search_path", schema)]);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .connect_with(options)
        .await?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        database = %config.database,
        schema = %schema,
        max_connections = config.max_connections,
        "Database connection pool created"
    );

    Ok(pool)
}

/// Check if the database connection is healthy.
pub async fn health_check(pool: &DbPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
