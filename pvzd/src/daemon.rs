//! Daemon: main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Store (PostgreSQL or in-memory)
//! - Reception engine, product ledger, pickup point registry, accounts
//! - API server (REST endpoints)
//! - Metrics server (Prometheus scrape endpoint)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Open the store (and run migrations for PostgreSQL)
//! 3. Start API and metrics servers
//! 4. Wait for SIGINT/SIGTERM
//! 5. Graceful shutdown: stop accepting, drain in-flight requests

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pvz_store::{MemoryStore, Store};

use crate::accounts::AccountService;
use crate::api::{create_metrics_router, create_router, AppState};
use crate::config::Config;
use crate::error::{PvzError, PvzResult};
use crate::metrics::Metrics;
use crate::product_ledger::ProductLedger;
use crate::reception_engine::ReceptionEngine;
use crate::registry::PickupPointRegistry;

// =============================================================================
// Daemon
// =============================================================================

/// The main PVZ daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Store shared by all components
    store: Arc<dyn Store>,
    /// Metrics registry
    metrics: Arc<Metrics>,
}

impl Daemon {
    /// Create a daemon over the given store.
    pub fn new(config: Config, store: Arc<dyn Store>) -> PvzResult<Self> {
        Ok(Self {
            config,
            store,
            metrics: Arc::new(Metrics::new()?),
        })
    }

    /// Create a daemon backed by [`MemoryStore`] (for testing/development).
    pub fn new_in_memory(config: Config) -> PvzResult<Self> {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    /// Create a daemon with the store selected by configuration.
    ///
    /// With `DATABASE_URL` set (and the `postgres` feature enabled) the pool
    /// is opened and pending migrations are applied before serving.
    pub async fn from_config(config: Config) -> PvzResult<Self> {
        let Some(url) = config.database.url.clone() else {
            warn!("DATABASE_URL not set, using in-memory store");
            return Self::new_in_memory(config);
        };

        Self::open_postgres(config, &url).await
    }

    #[cfg(feature = "postgres")]
    async fn open_postgres(config: Config, url: &str) -> PvzResult<Self> {
        let pool = pvz_db::connect(url, config.database.max_connections)
            .await
            .map_err(|e| PvzError::Config(format!("Failed to connect to database: {}", e)))?;

        pvz_db::migrate(&pool)
            .await
            .map_err(|e| PvzError::Internal(format!("Migration failed: {}", e)))?;

        info!(max_connections = config.database.max_connections, "Connected to PostgreSQL");
        Self::new(config, Arc::new(pvz_store::PgStore::new(pool)))
    }

    #[cfg(not(feature = "postgres"))]
    async fn open_postgres(config: Config, _url: &str) -> PvzResult<Self> {
        warn!("Built without the postgres feature, ignoring DATABASE_URL and using in-memory store");
        Self::new_in_memory(config)
    }

    /// Metrics shared with the API state.
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Build the API router with fresh component instances.
    pub fn router(&self) -> Router {
        create_router(self.app_state())
    }

    fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState {
            engine: ReceptionEngine::new(self.store.clone(), self.metrics.clone()),
            ledger: ProductLedger::new(self.store.clone(), self.metrics.clone()),
            registry: PickupPointRegistry::new(self.store.clone(), self.metrics.clone()),
            accounts: AccountService::new(self.store.clone(), &self.config.auth),
            metrics: self.metrics.clone(),
        })
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT/SIGTERM).
    pub async fn run(self) -> PvzResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting PVZ daemon"
        );

        let shutdown = CancellationToken::new();
        let servers = self.start(shutdown.clone()).await?;

        tokio::spawn(async move {
            wait_for_signal().await;
            info!("Received shutdown signal");
            shutdown.cancel();
        });

        servers.wait().await;
        info!("Shutdown complete");

        Ok(())
    }

    /// Bind and start the API and metrics servers.
    ///
    /// Both stop accepting connections once `shutdown` is cancelled and
    /// finish after in-flight requests complete.
    pub async fn start(self, shutdown: CancellationToken) -> PvzResult<RunningServers> {
        let host = self.config.api.host.clone();
        let mut tasks = JoinSet::new();

        let api_listener = bind(&host, self.config.api.port).await?;
        let api_addr = local_addr(&api_listener)?;
        spawn_server(&mut tasks, "api", api_listener, self.router(), shutdown.clone());
        info!(%api_addr, "API server started");

        let metrics_listener = bind(&host, self.config.api.metrics_port).await?;
        let metrics_addr = local_addr(&metrics_listener)?;
        spawn_server(
            &mut tasks,
            "metrics",
            metrics_listener,
            create_metrics_router(self.metrics.clone()),
            shutdown,
        );
        info!(%metrics_addr, "Metrics server started");

        Ok(RunningServers {
            api_addr,
            metrics_addr,
            tasks,
        })
    }
}

/// Handle to the spawned servers.
pub struct RunningServers {
    /// Bound REST address
    pub api_addr: SocketAddr,
    /// Bound metrics address
    pub metrics_addr: SocketAddr,
    tasks: JoinSet<()>,
}

impl RunningServers {
    /// Wait until both servers have shut down.
    pub async fn wait(mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Server task panicked");
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn bind(host: &str, port: u16) -> PvzResult<TcpListener> {
    let addr = format!("{}:{}", host, port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| PvzError::Config(format!("Failed to bind to {}: {}", addr, e)))
}

fn local_addr(listener: &TcpListener) -> PvzResult<SocketAddr> {
    listener
        .local_addr()
        .map_err(|e| PvzError::Config(format!("Failed to get local address: {}", e)))
}

fn spawn_server(
    tasks: &mut JoinSet<()>,
    name: &'static str,
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) {
    tasks.spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;

        match result {
            Ok(()) => info!(server = name, "Server stopped"),
            Err(e) => error!(server = name, error = %e, "Server error"),
        }
    });
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
