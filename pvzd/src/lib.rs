//! PVZ Daemon Library
//!
//! Backend for pickup points: registers pickup points, runs the reception
//! lifecycle and keeps the product ledger, behind a JWT-authorized REST API.
//!
//! # Architecture
//!
//! ```text
//! REST API → Accounts (role check)
//!          → Pickup Point Registry ┐
//!          → Reception Engine      ├→ Store (PostgreSQL | memory)
//!          → Product Ledger        ┘
//! ```
//!
//! # Components
//!
//! - **Daemon**: wiring, servers, graceful shutdown
//! - **Reception Engine**: opens and closes receptions, one in progress per pickup point
//! - **Product Ledger**: appends products, removes the last one (LIFO)
//! - **Registry**: creates pickup points, paginated composite listing
//! - **Accounts**: dummy login, register, login, token validation
//! - **Metrics**: Prometheus collectors in an owned registry
//! - **Config**: environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use pvzd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::from_config(config).await.expect("Failed to start");
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod accounts;
pub mod api;
pub mod config;
pub mod daemon;
pub mod db;
pub mod error;
pub mod metrics;
pub mod product_ledger;
pub mod reception_engine;
pub mod registry;

// Re-exports for convenience
pub use accounts::{AccountService, Claims, JwtManager};
pub use api::{create_metrics_router, create_router, AppState};
pub use config::{ApiConfig, AuthConfig, Config, DatabaseConfig, Environment, LogFormat};
pub use daemon::{Daemon, RunningServers};
pub use error::{ErrorKind, PvzError, PvzResult};
pub use metrics::Metrics;
pub use product_ledger::ProductLedger;
pub use reception_engine::ReceptionEngine;
pub use registry::{ListPickupPoints, PickupPointRegistry};
