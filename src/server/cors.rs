//! Permissive cross-origin headers.
//!
//! The renewal endpoint is called straight from browser back-offices on other
//! origins, so every response carries an allow-all CORS header set.
//! `CorsLayer` answers every `OPTIONS` request itself and only sends the
//! method and header lists on those pre-flight answers; the set-header layers
//! fill them in on the remaining responses.

use axum::{
    http::{
        header::{
            ACCEPT, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, AUTHORIZATION,
            CONTENT_TYPE,
        },
        HeaderValue, Method,
    },
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
};

/// Methods advertised on every response, in `CorsLayer`'s list format.
pub const ALLOW_METHODS: &str = "POST,OPTIONS";
/// Request headers advertised on every response, in `CorsLayer`'s list format.
pub const ALLOW_HEADERS: &str = "content-type,authorization,accept";

/// Allow-all CORS policy for the extension endpoint.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, ACCEPT])
}

/// Wrap `router` so every response, whatever its status, carries the CORS headers.
pub fn with_cors<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(cors_layer())
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        ))
}
