//! PVZ Daemon
//!
//! REST backend for pickup points, receptions and products.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration (in-memory store)
//! cargo run -p pvzd
//!
//! # Start against PostgreSQL
//! DATABASE_URL=postgres://localhost/pvz cargo run -p pvzd --features postgres
//!
//! # Database maintenance
//! cargo run -p pvzd -- db migrate
//! cargo run -p pvzd -- db status
//! ```
//!
//! # Environment Variables
//!
//! - `PVZ_ENV`: Environment (test, development, production)
//! - `PVZ_API_HOST`: API host (default: 0.0.0.0)
//! - `PVZ_API_PORT`: API port (default: 8080)
//! - `PVZ_METRICS_PORT`: Metrics port (default: 9000)
//! - `DATABASE_URL`: PostgreSQL URL (required in production)
//! - `PVZ_DB_MAX_CONNECTIONS`: Pool size (default: 20)
//! - `JWT_SECRET`: Token signing secret (required in production)
//! - `JWT_EXPIRY_SECS`: Token lifetime (default: 86400)
//! - `PVZ_LOG_FORMAT`: `pretty` or `json`

use pvzd::{Config, Daemon, LogFormat};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Database subcommands don't need the full daemon configuration
    if args.get(1).map(String::as_str) == Some("db") {
        init_tracing(LogFormat::Pretty)?;
        return pvzd::db::run_db_command(args).await;
    }

    // Load configuration
    let config = Config::from_env()?;
    init_tracing(config.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        metrics_port = config.api.metrics_port,
        "PVZ Daemon"
    );

    // Create and run daemon
    let daemon = Daemon::from_config(config).await?;
    daemon.run().await?;

    Ok(())
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("pvzd=info".parse()?);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }

    Ok(())
}
