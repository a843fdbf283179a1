//! Request logging middleware and registration audit events.
//!
//! This module provides:
//! - Tracing subscriber setup from [`LoggingConfig`]
//! - Unique request ID tracking and request timing
//! - Structured events for every registration state change
//! - The health check payload
//!
//! # Usage
//!
//! ```rust,ignore
//! use axum::middleware;
//! use qrdoc::server::logging::request_logging_middleware;
//!
//! let app = Router::new()
//!     .route("/health", get(health_handler))
//!     .layer(middleware::from_fn(request_logging_middleware));
//! ```

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Response},
    middleware::Next,
};
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::LoggingConfig;

/// Install the global fmt subscriber.
///
/// Does nothing when logging is disabled. `RUST_LOG` takes precedence over the
/// configured level. Calling this twice is harmless; the second install fails
/// silently.
pub fn init_tracing(config: &LoggingConfig) {
    if !config.enabled {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Registration state change event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationEvent {
    /// Expiry was pushed forward and the registration marked valid
    Extended,
    /// Request was refused before touching the store
    ExtensionRejected,
    /// No registration with the requested id
    NotFound,
    /// Update statement changed no rows
    UpdateFailed,
    /// Store failed unexpectedly
    InternalFailure,
}

impl std::fmt::Display for RegistrationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RegistrationEvent::Extended => "extended",
            RegistrationEvent::ExtensionRejected => "extension_rejected",
            RegistrationEvent::NotFound => "not_found",
            RegistrationEvent::UpdateFailed => "update_failed",
            RegistrationEvent::InternalFailure => "internal_failure",
        };
        write!(f, "{}", s)
    }
}

/// Log a registration event for audit and debugging.
///
/// `registration_id` is `None` when the request never produced a usable id.
/// Internal failures are emitted at error level so they reach the diagnostics
/// sink with their timestamp.
pub fn log_registration_event(
    event: RegistrationEvent,
    registration_id: Option<i64>,
    details: Option<&str>,
) {
    let span = info_span!(
        "registration_event",
        event = %event,
        registration_id = ?registration_id,
    );
    let _enter = span.enter();
    let details = details.unwrap_or("");

    match event {
        RegistrationEvent::Extended => info!(details = %details, "Registration event occurred"),
        RegistrationEvent::ExtensionRejected | RegistrationEvent::NotFound => {
            warn!(reason = %details, "Registration event occurred")
        }
        RegistrationEvent::UpdateFailed | RegistrationEvent::InternalFailure => {
            error!(reason = %details, "Update expiry error")
        }
    }
}

/// Header name for the request ID.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Generate a new unique request ID.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Logging middleware that tracks request timing and generates request IDs.
///
/// This middleware:
/// 1. Generates a unique request ID for each incoming request
/// 2. Creates a tracing span with the request ID
/// 3. Logs the request method and path
/// 4. Measures and logs the response time
/// 5. Adds the request ID to the response headers
pub async fn request_logging_middleware(request: Request, next: Next) -> Response<Body> {
    let request_id = generate_request_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();

    let response = async move {
        info!("Started processing request");
        next.run(request).await
    }
    .instrument(span.clone())
    .await;

    let duration = start.elapsed();
    let status = response.status();

    let _enter = span.enter();
    info!(
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    let (mut parts, body) = response.into_parts();
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, header_value);
    }

    Response::from_parts(parts, body)
}

/// Health check response structure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    /// Service status ("healthy" or "degraded")
    pub status: String,
    pub service: String,
    pub version: String,
    pub database: DatabaseHealth,
}

/// Database health status.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DatabaseHealth {
    pub connected: bool,
    /// Backend name (sqlite, postgres, mysql, memory)
    pub db_type: String,
}

impl HealthResponse {
    pub fn from_probe(db_connected: bool, db_type: &str) -> Self {
        Self {
            status: if db_connected { "healthy" } else { "degraded" }.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: DatabaseHealth {
                connected: db_connected,
                db_type: db_type.to_string(),
            },
        }
    }
}
