//! Error taxonomy of the expiry extension endpoint.
//!
//! Every variant becomes a JSON body of the form
//!
//! ```json
//! { "error": "Registro não encontrado" }
//! ```
//!
//! with the HTTP status returned by [`ExtensionError::status_code`]. The message
//! strings are part of the public contract; deployed clients match on them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::QrDocError;

pub const MSG_INVALID_JSON: &str = "JSON inválido";
pub const MSG_MISSING_PARAMS: &str = "Parâmetros 'id' e 'months' são obrigatórios";
pub const MSG_INVALID_ID: &str = "Parâmetro 'id' inválido";
pub const MSG_INVALID_PERIOD: &str = "Período inválido. Use 1, 3 ou 6 meses";
pub const MSG_NOT_FOUND: &str = "Registro não encontrado";
pub const MSG_UPDATE_FAILED: &str = "Erro ao atualizar registro";
pub const MSG_INTERNAL_PREFIX: &str = "Erro interno do servidor: ";
pub const MSG_METHOD_NOT_ALLOWED: &str = "Method not allowed";

/// Why an extension request failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    /// Body absent, unparseable, or missing `id` / `months`. Carries the message.
    InvalidInput(&'static str),
    /// `months` is not one of the allowed periods.
    InvalidPeriod,
    /// No registration has the requested id.
    NotFound,
    /// The update statement reported no affected rows.
    PersistenceFailure,
    /// Connection failure or unexpected store error.
    Internal(String),
    /// Request used a method other than POST or OPTIONS.
    MethodNotAllowed,
}

/// JSON body for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ExtensionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ExtensionError::InvalidInput(_) | ExtensionError::InvalidPeriod => {
                StatusCode::BAD_REQUEST
            }
            ExtensionError::NotFound => StatusCode::NOT_FOUND,
            ExtensionError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ExtensionError::PersistenceFailure | ExtensionError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            ExtensionError::InvalidInput(msg) => (*msg).to_string(),
            ExtensionError::InvalidPeriod => MSG_INVALID_PERIOD.to_string(),
            ExtensionError::NotFound => MSG_NOT_FOUND.to_string(),
            ExtensionError::PersistenceFailure => MSG_UPDATE_FAILED.to_string(),
            ExtensionError::Internal(detail) => format!("{MSG_INTERNAL_PREFIX}{detail}"),
            ExtensionError::MethodNotAllowed => MSG_METHOD_NOT_ALLOWED.to_string(),
        }
    }
}

impl std::fmt::Display for ExtensionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ExtensionError {}

impl From<QrDocError> for ExtensionError {
    fn from(err: QrDocError) -> Self {
        ExtensionError::Internal(err.to_string())
    }
}

impl IntoResponse for ExtensionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.message(),
        };

        (status, Json(body)).into_response()
    }
}
