//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{PvzError, PvzResult};
use std::env;
use std::str::FromStr;

/// Secret used outside production when `JWT_SECRET` is unset
const DEV_JWT_SECRET: &str = "pvz-development-secret";

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Token configuration
    pub auth: AuthConfig,

    /// Log output format
    pub log_format: LogFormat,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// REST port
    pub port: u16,
    /// Prometheus scrape port
    pub metrics_port: u16,
}

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL URL; `None` selects the in-memory store
    pub url: Option<String>,
    /// Pool size
    pub max_connections: u32,
}

/// Token configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: String,
    /// Token lifetime in seconds
    pub token_ttl_secs: i64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable
    Pretty,
    /// One JSON object per line
    Json,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> PvzResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let api = Self::load_api_config()?;
        let database = Self::load_database_config(environment)?;
        let auth = Self::load_auth_config(environment)?;
        let log_format = Self::load_log_format()?;

        Ok(Self {
            api,
            database,
            auth,
            log_format,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                metrics_port: 0,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
            },
            auth: AuthConfig {
                jwt_secret: "pvz-test-secret".to_string(),
                token_ttl_secs: 3600,
            },
            log_format: LogFormat::Pretty,
            environment: Environment::Test,
        }
    }

    fn load_environment() -> PvzResult<Environment> {
        let env_str = env::var("PVZ_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(PvzError::Config(format!(
                "Invalid PVZ_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_api_config() -> PvzResult<ApiConfig> {
        let host = env::var("PVZ_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = Self::load_parsed_env("PVZ_API_PORT", 8080u16)?;
        let metrics_port = Self::load_parsed_env("PVZ_METRICS_PORT", 9000u16)?;

        Ok(ApiConfig {
            host,
            port,
            metrics_port,
        })
    }

    fn load_database_config(environment: Environment) -> PvzResult<DatabaseConfig> {
        let url = env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        if url.is_none() && environment == Environment::Production {
            return Err(PvzError::Config(
                "DATABASE_URL is required in production".to_string(),
            ));
        }

        let max_connections = Self::load_parsed_env("PVZ_DB_MAX_CONNECTIONS", 20u32)?;

        Ok(DatabaseConfig {
            url,
            max_connections,
        })
    }

    fn load_auth_config(environment: Environment) -> PvzResult<AuthConfig> {
        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ if environment == Environment::Production => {
                return Err(PvzError::Config("JWT_SECRET is required in production".to_string()));
            },
            _ => DEV_JWT_SECRET.to_string(),
        };

        let token_ttl_secs = Self::load_parsed_env("JWT_EXPIRY_SECS", 86_400i64)?;
        if token_ttl_secs <= 0 {
            return Err(PvzError::Config(format!(
                "Invalid JWT_EXPIRY_SECS value: {}",
                token_ttl_secs
            )));
        }

        Ok(AuthConfig {
            jwt_secret,
            token_ttl_secs,
        })
    }

    fn load_log_format() -> PvzResult<LogFormat> {
        let raw = env::var("PVZ_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
        match raw.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(PvzError::Config(format!(
                "Invalid PVZ_LOG_FORMAT: {}. Expected: pretty, json",
                other
            ))),
        }
    }

    fn load_parsed_env<T: FromStr>(key: &str, default: T) -> PvzResult<T> {
        match env::var(key) {
            Ok(val) => val
                .parse::<T>()
                .map_err(|_| PvzError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                metrics_port: 9000,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
            },
            auth: AuthConfig {
                jwt_secret: DEV_JWT_SECRET.to_string(),
                token_ttl_secs: 86_400,
            },
            log_format: LogFormat::Pretty,
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
