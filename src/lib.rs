//! qrdoc - validity renewal for issued QR identity-document registrations.
//!
//! One endpoint extends a registration's expiry by 1, 3 or 6 calendar months
//! and marks it valid again. A registration that is still valid is extended
//! from its current expiry; a lapsed one restarts from now.
//!
//! # Features
//!
//! - `sqlite` - SQLite store backend. Enabled by default.
//! - `postgres` - PostgreSQL store backend.
//! - `mysql` - MySQL / MariaDB store backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use qrdoc::server::{build_router, AppState, Database};
//!
//! let db = Database::new().await?;
//! let app = build_router(AppState::with_local_clock(db));
//! ```

#[cfg(not(any(feature = "sqlite", feature = "postgres", feature = "mysql")))]
compile_error!("enable at least one store backend feature: sqlite, postgres or mysql");

pub mod clock;
pub mod config;
pub mod errors;
pub mod extension;

#[path = "server/mod.rs"]
pub mod server;
