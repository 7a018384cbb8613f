//! Database lifecycle management for PVZ.
//!
//! Provides pool construction, migration running and status checking.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{info, warn};

/// Result type for DB operations.
pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// One row of `_sqlx_migrations`
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    pub version: i64,
    pub description: String,
    pub installed_on: DateTime<Utc>,
    pub success: bool,
}

/// Open a connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Run all pending migrations.
///
/// Uses sqlx migrations from the workspace `migrations` directory.
/// Idempotent: safe to run multiple times.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::migrate!("../migrations").run(pool).await?;

    info!("Migrations completed successfully");
    Ok(())
}

/// Check database connectivity and migration status.
///
/// Logs and returns the latest applied migrations (newest first). An empty
/// list means the schema has not been migrated yet.
pub async fn status(pool: &PgPool) -> Result<Vec<AppliedMigration>> {
    // Check connectivity
    let result: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;

    if result != 1 {
        return Err(anyhow::anyhow!("Database connectivity check failed"));
    }

    info!("Database connectivity: OK");

    // Runtime query: sqlx::query! requires DB at compile time
    let rows = sqlx::query(
        r#"
        SELECT version, description, installed_on, success
        FROM _sqlx_migrations
        ORDER BY version DESC
        LIMIT 10
        "#,
    )
    .fetch_all(pool)
    .await;

    let rows = match rows {
        Ok(rows) => rows,
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("42P01") => {
            // undefined_table
            warn!("Migration table not found (run `pvzd db migrate` first)");
            return Ok(Vec::new());
        },
        Err(e) => return Err(e.into()),
    };

    let mut applied = Vec::with_capacity(rows.len());
    for row in rows {
        applied.push(AppliedMigration {
            version: row.try_get("version")?,
            description: row.try_get("description")?,
            installed_on: row.try_get("installed_on")?,
            success: row.try_get("success")?,
        });
    }

    if applied.is_empty() {
        warn!("No migrations found in database (run `pvzd db migrate` first)");
        return Ok(applied);
    }

    info!("Latest migrations:");
    for mig in &applied {
        let mark = if mig.success { "✓" } else { "✗" };
        info!("  {} v{}: {} ({})", mark, mig.version, mig.description, mig.installed_on);
    }

    Ok(applied)
}
