// src/server/mod.rs

//! Server-side components.
//!
//! This module contains:
//! - `store`       → Store capability traits + in-memory store
//! - `database`    → Pooled SQLite / Postgres / MySQL store
//! - `validation`  → Request body decoding
//! - `api_error`   → Error taxonomy and HTTP mapping
//! - `handlers`    → Axum HTTP handlers and shared state
//! - `cors`        → Cross-origin header layers
//! - `logging`     → Request logging, audit events, health payload
//! - `routes`      → Router builder

pub mod api_error;
pub mod cors;
pub mod database;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod store;
pub mod validation;

pub use api_error::{ErrorResponse, ExtensionError};
pub use database::{Database, DatabaseConnection, Registration};
pub use handlers::{
    extend_expiry_handler, extend_registration, health_handler, AppState, ExtendExpiryResponse,
    ExtensionData, ExtensionOutcome,
};
pub use routes::build_router;
pub use store::{MemoryStore, RegistrationStore, StoreProvider};
pub use validation::{parse_extend_request, ExtendExpiryRequest};
