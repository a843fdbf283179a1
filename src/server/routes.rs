use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, MethodRouter},
    Router,
};

use crate::server::cors::with_cors;
use crate::server::handlers::{
    extend_expiry_handler, health_handler, method_not_allowed_handler, AppState,
};
use crate::server::logging::request_logging_middleware;

/// Path of the expiry extension endpoint.
pub const UPDATE_EXPIRY_PATH: &str = "/api/update_expiry";

/// Legacy script path kept so existing clients need no change.
pub const LEGACY_UPDATE_EXPIRY_PATH: &str = "/api/update_expiry.php";

/// Largest request body the extension endpoint reads.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

fn update_expiry_route() -> MethodRouter<AppState> {
    post(extend_expiry_handler).fallback(method_not_allowed_handler)
}

/// Build the main application router.
///
/// # Routes
///
/// - `POST /api/update_expiry` - Extend a registration's validity
/// - `OPTIONS` on any path - CORS pre-flight, answered by the CORS layer
/// - `POST /api/update_expiry.php` - Same endpoint under its legacy path
/// - `GET /health` - Service and store health
///
/// Every response carries CORS headers and an `X-Request-Id`.
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route(UPDATE_EXPIRY_PATH, update_expiry_route())
        .route(LEGACY_UPDATE_EXPIRY_PATH, update_expiry_route())
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    with_cors(router)
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}
