use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::{Clock, LocalClock};
use crate::errors::QrDocError;
use crate::extension::{format_timestamp, plan_extension};
use crate::server::api_error::{ExtensionError, MSG_INVALID_JSON};
use crate::server::database::VALIDATION_VALID;
use crate::server::logging::{log_registration_event, HealthResponse, RegistrationEvent};
use crate::server::store::StoreProvider;
use crate::server::validation::{parse_extend_request, ExtendExpiryRequest};

/// Message returned with every successful extension.
pub const MSG_EXTENDED: &str = "Validade reativada com sucesso";

/// Shared application state for handlers.
///
/// The store provider and clock are injected so the same handlers run
/// against a pooled database in production and an in-memory store in tests.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreProvider>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn StoreProvider>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// State using the host's local wall clock.
    pub fn with_local_clock(store: Arc<dyn StoreProvider>) -> Self {
        Self::new(store, Arc::new(LocalClock))
    }
}

/// What a successful extension did to the registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionOutcome {
    pub id: i64,
    pub previous_expiry: Option<NaiveDateTime>,
    pub new_expiry: NaiveDateTime,
    pub months_added: u32,
    pub cumulative: bool,
}

/// Success body of `POST /api/update_expiry`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtendExpiryResponse {
    pub success: bool,
    pub message: String,
    pub data: ExtensionData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtensionData {
    pub id: i64,
    pub new_expiry_date: String,
    pub months_added: u32,
    pub validation: String,
    pub previous_expiry: Option<String>,
    pub cumulative: bool,
}

impl From<ExtensionOutcome> for ExtendExpiryResponse {
    fn from(outcome: ExtensionOutcome) -> Self {
        Self {
            success: true,
            message: MSG_EXTENDED.to_string(),
            data: ExtensionData {
                id: outcome.id,
                new_expiry_date: format_timestamp(&outcome.new_expiry),
                months_added: outcome.months_added,
                validation: VALIDATION_VALID.to_string(),
                previous_expiry: outcome.previous_expiry.as_ref().map(format_timestamp),
                cumulative: outcome.cumulative,
            },
        }
    }
}

fn internal_failure(id: i64, err: QrDocError) -> ExtensionError {
    log_registration_event(
        RegistrationEvent::InternalFailure,
        Some(id),
        Some(&err.to_string()),
    );
    err.into()
}

/// Apply the extension rule to one registration.
///
/// Acquires a single store connection, reads the registration, computes the
/// new expiry against `clock`, and writes it back with `validation = 'valid'`.
/// The connection is released when this returns, on every path.
///
/// Concurrent calls for the same id are not serialized; the last write wins.
pub async fn extend_registration(
    provider: &dyn StoreProvider,
    clock: &dyn Clock,
    request: ExtendExpiryRequest,
) -> Result<ExtensionOutcome, ExtensionError> {
    let id = request.id;

    let mut store = provider
        .acquire()
        .await
        .map_err(|e| internal_failure(id, e))?;

    let Some(registration) = store
        .find_by_id(id)
        .await
        .map_err(|e| internal_failure(id, e))?
    else {
        log_registration_event(RegistrationEvent::NotFound, Some(id), None);
        return Err(ExtensionError::NotFound);
    };

    let plan = plan_extension(registration.expiry_date, clock.now(), request.months)
        .map_err(|e| internal_failure(id, e))?;

    let updated = store
        .update_expiry(id, plan.new_expiry)
        .await
        .map_err(|e| internal_failure(id, e))?;

    if !updated {
        log_registration_event(
            RegistrationEvent::UpdateFailed,
            Some(id),
            Some("update affected no rows"),
        );
        return Err(ExtensionError::PersistenceFailure);
    }

    let outcome = ExtensionOutcome {
        id,
        previous_expiry: registration.expiry_date,
        new_expiry: plan.new_expiry,
        months_added: request.months.months(),
        cumulative: plan.cumulative,
    };

    log_registration_event(
        RegistrationEvent::Extended,
        Some(id),
        Some(&format!(
            "months={} base={} new_expiry={} cumulative={} was_valid={}",
            outcome.months_added,
            format_timestamp(&plan.base),
            format_timestamp(&outcome.new_expiry),
            outcome.cumulative,
            registration.is_valid()
        )),
    );

    Ok(outcome)
}

/// Handler for extending a registration's validity.
///
/// The body is read raw so malformed JSON, and bodies the framework refuses to
/// buffer, get the endpoint's own error body instead of the framework rejection.
pub async fn extend_expiry_handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ExtendExpiryResponse>, ExtensionError> {
    let body = body.map_err(|rejection| {
        warn!("Unreadable request body: {rejection}");
        ExtensionError::InvalidInput(MSG_INVALID_JSON)
    })?;

    let request = parse_extend_request(&body).inspect_err(|e| {
        log_registration_event(
            RegistrationEvent::ExtensionRejected,
            None,
            Some(&e.message()),
        );
    })?;

    info!(
        "Extending registration id={} by {} months",
        request.id,
        request.months.months()
    );

    let outcome = extend_registration(state.store.as_ref(), state.clock.as_ref(), request).await?;

    Ok(Json(outcome.into()))
}

/// Any method other than POST or OPTIONS on the extension route.
pub async fn method_not_allowed_handler() -> ExtensionError {
    ExtensionError::MethodNotAllowed
}

/// `GET /health` - report service and store status.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.store.ping().await;
    Json(HealthResponse::from_probe(connected, state.store.backend()))
}
