use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::pool::PoolConnection;
use sqlx::{query, query_as, FromRow};
use std::sync::Arc;
use tracing::{debug, error};

#[cfg(feature = "sqlite")]
use sqlx::{sqlite::SqlitePoolOptions, Sqlite, SqlitePool};

#[cfg(feature = "postgres")]
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres};

#[cfg(feature = "mysql")]
use sqlx::{mysql::MySqlPoolOptions, MySql, MySqlPool};

use crate::config::{get_config, DatabaseConfig};
use crate::errors::{QrDocError, QrDocResult};
use crate::server::store::{RegistrationStore, StoreProvider};

/// Value of `registrations.validation` for a usable registration.
pub const VALIDATION_VALID: &str = "valid";

/// One row of the `registrations` table.
///
/// Only the columns the renewal flow reads are mapped.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Registration {
    pub id: i64,
    pub expiry_date: Option<NaiveDateTime>,
    pub validation: Option<String>,
}

impl Registration {
    pub fn new(id: i64, expiry_date: Option<NaiveDateTime>, validation: &str) -> Self {
        Self {
            id,
            expiry_date,
            validation: Some(validation.to_string()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validation.as_deref() == Some(VALIDATION_VALID)
    }
}

/// Pooled SQL backends.
///
/// Available variants depend on enabled features:
/// - `sqlite` feature enables `Database::SQLite`
/// - `postgres` feature enables `Database::Postgres`
/// - `mysql` feature enables `Database::MySql`
#[derive(Debug, Clone)]
pub enum Database {
    #[cfg(feature = "sqlite")]
    SQLite(SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(PgPool),
    #[cfg(feature = "mysql")]
    MySql(MySqlPool),
}

/// A connection checked out of a [`Database`] pool for one request.
///
/// Dropping it returns the connection to the pool.
#[derive(Debug)]
pub enum DatabaseConnection {
    #[cfg(feature = "sqlite")]
    SQLite(PoolConnection<Sqlite>),
    #[cfg(feature = "postgres")]
    Postgres(PoolConnection<Postgres>),
    #[cfg(feature = "mysql")]
    MySql(PoolConnection<MySql>),
}

impl Database {
    /// Initialize the pool from the global configuration.
    pub async fn new() -> QrDocResult<Arc<Self>> {
        let config = get_config()?;
        Ok(Arc::new(Self::connect(&config.database).await?))
    }

    /// Open a pool for an explicit database configuration.
    pub async fn connect(db_config: &DatabaseConfig) -> QrDocResult<Self> {
        let max = db_config.max_connections;

        match db_config.db_type.as_str() {
            #[cfg(feature = "sqlite")]
            "sqlite" => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(max)
                    .connect(db_config.active_url())
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to SQLite: {e}");
                        QrDocError::DatabaseError(format!("failed to connect to SQLite: {e}"))
                    })?;

                Ok(Database::SQLite(pool))
            }
            #[cfg(not(feature = "sqlite"))]
            "sqlite" => Err(QrDocError::ConfigError(
                "SQLite support not compiled in. Enable the 'sqlite' feature.".to_string(),
            )),
            #[cfg(feature = "postgres")]
            "postgres" => {
                let pool = PgPoolOptions::new()
                    .max_connections(max)
                    .connect(db_config.active_url())
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to PostgreSQL: {e}");
                        QrDocError::DatabaseError(format!("failed to connect to PostgreSQL: {e}"))
                    })?;

                Ok(Database::Postgres(pool))
            }
            #[cfg(not(feature = "postgres"))]
            "postgres" => Err(QrDocError::ConfigError(
                "PostgreSQL support not compiled in. Enable the 'postgres' feature.".to_string(),
            )),
            #[cfg(feature = "mysql")]
            "mysql" => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(max)
                    .connect(db_config.active_url())
                    .await
                    .map_err(|e| {
                        error!("Failed to connect to MySQL: {e}");
                        QrDocError::DatabaseError(format!("failed to connect to MySQL: {e}"))
                    })?;

                Ok(Database::MySql(pool))
            }
            #[cfg(not(feature = "mysql"))]
            "mysql" => Err(QrDocError::ConfigError(
                "MySQL support not compiled in. Enable the 'mysql' feature.".to_string(),
            )),
            other => Err(QrDocError::ConfigError(format!(
                "unsupported database type: {other}"
            ))),
        }
    }

    /// Check out one connection for the duration of a request.
    pub async fn checkout(&self) -> QrDocResult<DatabaseConnection> {
        let conn = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => pool.acquire().await.map(DatabaseConnection::SQLite),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => pool.acquire().await.map(DatabaseConnection::Postgres),
            #[cfg(feature = "mysql")]
            Database::MySql(pool) => pool.acquire().await.map(DatabaseConnection::MySql),
        };

        conn.map_err(|e| {
            error!("Failed to acquire {} connection: {e}", self.backend_name());
            QrDocError::DatabaseError(format!("failed to acquire connection: {e}"))
        })
    }

    fn backend_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Database::Postgres(_) => "postgres",
            #[cfg(feature = "mysql")]
            Database::MySql(_) => "mysql",
        }
    }
}

#[async_trait]
impl StoreProvider for Database {
    async fn acquire(&self) -> QrDocResult<Box<dyn RegistrationStore>> {
        Ok(Box::new(self.checkout().await?))
    }

    async fn ping(&self) -> bool {
        let result = match self {
            #[cfg(feature = "sqlite")]
            Database::SQLite(pool) => query("SELECT 1").execute(pool).await.map(|_| ()),
            #[cfg(feature = "postgres")]
            Database::Postgres(pool) => query("SELECT 1").execute(pool).await.map(|_| ()),
            #[cfg(feature = "mysql")]
            Database::MySql(pool) => query("SELECT 1").execute(pool).await.map(|_| ()),
        };

        if let Err(e) = &result {
            error!("{} ping failed: {e}", self.backend_name());
        }
        result.is_ok()
    }

    fn backend(&self) -> &'static str {
        self.backend_name()
    }
}

#[async_trait]
impl RegistrationStore for DatabaseConnection {
    /// Fetch a registration by its ID.
    ///
    /// Returns:
    /// - `Ok(Some(Registration))` if found
    /// - `Ok(None)` if not found
    /// - `Err(QrDocError::DatabaseError)` on DB failure
    async fn find_by_id(&mut self, id: i64) -> QrDocResult<Option<Registration>> {
        debug!("Looking up registration id={id}");

        let registration = match self {
            #[cfg(feature = "sqlite")]
            DatabaseConnection::SQLite(conn) => query_as::<_, Registration>(
                "SELECT id, expiry_date, validation FROM registrations WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&mut **conn)
            .await
            .map_err(|e| {
                error!("SQLite find_by_id failed: {e}");
                QrDocError::from(e)
            })?,
            #[cfg(feature = "postgres")]
            DatabaseConnection::Postgres(conn) => query_as::<_, Registration>(
                "SELECT id, expiry_date, validation FROM registrations WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&mut **conn)
            .await
            .map_err(|e| {
                error!("Postgres find_by_id failed: {e}");
                QrDocError::from(e)
            })?,
            #[cfg(feature = "mysql")]
            DatabaseConnection::MySql(conn) => query_as::<_, Registration>(
                "SELECT id, expiry_date, validation FROM registrations WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&mut **conn)
            .await
            .map_err(|e| {
                error!("MySQL find_by_id failed: {e}");
                QrDocError::from(e)
            })?,
        };

        Ok(registration)
    }

    /// Write the new expiry and reset `validation` to `valid`.
    ///
    /// Returns:
    /// - `Ok(true)` if a row was updated
    /// - `Ok(false)` if no row was changed
    /// - `Err(QrDocError::DatabaseError)` on DB failure
    async fn update_expiry(&mut self, id: i64, new_expiry: NaiveDateTime) -> QrDocResult<bool> {
        let rows_affected = match self {
            #[cfg(feature = "sqlite")]
            DatabaseConnection::SQLite(conn) => query(
                "UPDATE registrations \
                     SET expiry_date = ?, validation = 'valid' \
                     WHERE id = ?",
            )
            .bind(new_expiry)
            .bind(id)
            .execute(&mut **conn)
            .await
            .map_err(|e| {
                error!("SQLite update_expiry failed: {e}");
                QrDocError::from(e)
            })?
            .rows_affected(),
            #[cfg(feature = "postgres")]
            DatabaseConnection::Postgres(conn) => query(
                "UPDATE registrations \
                     SET expiry_date = $1, validation = 'valid' \
                     WHERE id = $2",
            )
            .bind(new_expiry)
            .bind(id)
            .execute(&mut **conn)
            .await
            .map_err(|e| {
                error!("Postgres update_expiry failed: {e}");
                QrDocError::from(e)
            })?
            .rows_affected(),
            #[cfg(feature = "mysql")]
            DatabaseConnection::MySql(conn) => query(
                "UPDATE registrations \
                     SET expiry_date = ?, validation = 'valid' \
                     WHERE id = ?",
            )
            .bind(new_expiry)
            .bind(id)
            .execute(&mut **conn)
            .await
            .map_err(|e| {
                error!("MySQL update_expiry failed: {e}");
                QrDocError::from(e)
            })?
            .rows_affected(),
        };

        Ok(rows_affected > 0)
    }
}
