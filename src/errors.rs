//! Crate-wide error type.
//!
//! Store and configuration code returns [`QrDocResult`]. The HTTP layer has its
//! own taxonomy in `server::api_error` and converts these into it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QrDocError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// A store operation failed (connection, query, decoding).
    #[error("database error: {0}")]
    DatabaseError(String),

    /// Anything else that went wrong while serving.
    #[error("server error: {0}")]
    ServerError(String),
}

pub type QrDocResult<T> = Result<T, QrDocError>;

impl From<sqlx::Error> for QrDocError {
    fn from(err: sqlx::Error) -> Self {
        QrDocError::DatabaseError(err.to_string())
    }
}
