//! Configuration system for the renewal service.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `QRDOC_SERVER_HOST` - Server bind address
//! - `QRDOC_SERVER_PORT` - Server port
//! - `QRDOC_DATABASE_TYPE` - Store backend: sqlite, postgres or mysql
//! - `QRDOC_DATABASE_URL` - Connection URL, routed to the backend matching its scheme
//! - `QRDOC_DATABASE_MAX_CONNECTIONS` - Pool size
//! - `QRDOC_LOGGING_ENABLED` - Enable the tracing subscriber
//! - `QRDOC_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
//!
//! Database credentials belong in the URL supplied by the deployment, never in
//! source code.

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{QrDocError, QrDocResult};

/// Global configuration singleton.
static CONFIG: OnceLock<QrDocConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QrDocConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite", "postgres" or "mysql"
    pub db_type: String,
    /// SQLite connection URL
    pub sqlite_url: String,
    /// PostgreSQL connection URL
    pub postgres_url: String,
    /// MySQL / MariaDB connection URL
    pub mysql_url: String,
    /// Maximum pooled connections
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://qrdoc.db".to_string(),
            postgres_url: "postgres://localhost/qrdoc".to_string(),
            mysql_url: "mysql://localhost/qrcode".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// The connection URL for the configured `db_type`.
    pub fn active_url(&self) -> &str {
        match self.db_type.as_str() {
            "postgres" => &self.postgres_url,
            "mysql" => &self.mysql_url,
            _ => &self.sqlite_url,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

fn config_err(e: config::ConfigError) -> QrDocError {
    QrDocError::ConfigError(e.to_string())
}

/// Read `QRDOC_DATABASE_URL` only when it carries the given scheme.
fn database_url_for(scheme: &str) -> Option<String> {
    env::var("QRDOC_DATABASE_URL")
        .ok()
        .filter(|url| url.starts_with(scheme))
}

impl QrDocConfig {
    /// Load configuration from file and environment, bypassing the global cache.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    pub fn load() -> QrDocResult<Self> {
        let builder = Config::builder()
            .set_default("server.host", "127.0.0.1")
            .map_err(config_err)?
            .set_default("server.port", 8080)
            .map_err(config_err)?
            .set_default("database.db_type", "sqlite")
            .map_err(config_err)?
            .set_default("database.sqlite_url", "sqlite://qrdoc.db")
            .map_err(config_err)?
            .set_default("database.postgres_url", "postgres://localhost/qrdoc")
            .map_err(config_err)?
            .set_default("database.mysql_url", "mysql://localhost/qrcode")
            .map_err(config_err)?
            .set_default("database.max_connections", 5)
            .map_err(config_err)?
            .set_default("logging.enabled", true)
            .map_err(config_err)?
            .set_default("logging.level", "info")
            .map_err(config_err)?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("server.host", env::var("QRDOC_SERVER_HOST").ok())
            .map_err(config_err)?
            .set_override_option(
                "server.port",
                env::var("QRDOC_SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(config_err)?
            .set_override_option("database.db_type", env::var("QRDOC_DATABASE_TYPE").ok())
            .map_err(config_err)?
            .set_override_option("database.sqlite_url", database_url_for("sqlite"))
            .map_err(config_err)?
            .set_override_option("database.postgres_url", database_url_for("postgres"))
            .map_err(config_err)?
            .set_override_option("database.mysql_url", database_url_for("mysql"))
            .map_err(config_err)?
            .set_override_option(
                "database.max_connections",
                env::var("QRDOC_DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(config_err)?
            .set_override_option(
                "logging.enabled",
                env::var("QRDOC_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(config_err)?
            .set_override_option("logging.level", env::var("QRDOC_LOG_LEVEL").ok())
            .map_err(config_err)?;

        let settings = builder
            .build()
            .map_err(|e| QrDocError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| QrDocError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> QrDocResult<()> {
        if self.server.port == 0 {
            return Err(QrDocError::ConfigError(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" | "mysql" => {}
            other => {
                return Err(QrDocError::ConfigError(format!(
                    "database.db_type must be 'sqlite', 'postgres' or 'mysql', got '{other}'"
                )));
            }
        }

        if self.database.max_connections == 0 {
            return Err(QrDocError::ConfigError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(QrDocError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// Loads and validates on first access, then returns the cached value.
pub fn get_config() -> QrDocResult<&'static QrDocConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = QrDocConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is fine.
    let _ = CONFIG.set(config);

    CONFIG
        .get()
        .ok_or_else(|| QrDocError::ConfigError("configuration was not initialized".to_string()))
}

/// Initialize configuration explicitly.
///
/// Call this early in `main` to surface configuration errors before serving.
pub fn init_config() -> QrDocResult<&'static QrDocConfig> {
    get_config()
}
