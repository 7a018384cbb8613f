//! Database CLI subcommands for pvzd.
//!
//! Provides `db migrate` and `db status` commands.

use anyhow::{anyhow, Result};
use std::env;
use tracing::info;

use pvz_db::{connect, migrate, status};

/// Run database CLI subcommands.
///
/// Supported commands:
/// - `pvzd db migrate` - Run pending migrations
/// - `pvzd db status` - Check connectivity and list applied migrations
pub async fn run_db_command(args: Vec<String>) -> Result<()> {
    if args.len() < 3 {
        return Err(anyhow!("Usage: pvzd db <migrate|status>"));
    }

    let _ = dotenvy::dotenv();
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| anyhow!("DATABASE_URL environment variable is required for db commands"))?;

    let pool = connect(&database_url, 1).await?;

    match args[2].as_str() {
        "migrate" => {
            migrate(&pool).await?;
        },
        "status" => {
            let applied = status(&pool).await?;
            if applied.is_empty() {
                info!("No migrations applied");
            }
            for m in applied {
                info!(
                    version = m.version,
                    description = %m.description,
                    installed_on = %m.installed_on,
                    success = m.success,
                    "Applied migration"
                );
            }
        },
        other => {
            return Err(anyhow!("Unknown db command: {}. Use migrate or status", other));
        },
    }

    pool.close().await;
    Ok(())
}
