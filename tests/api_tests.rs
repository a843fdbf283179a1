//! Integration tests for the expiry extension endpoint.
//!
//! The router runs against an in-memory SQLite database with a frozen clock
//! at 2025-06-01 00:00:00.

#![cfg(feature = "sqlite")]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tower::ServiceExt;

use qrdoc::clock::FixedClock;
use qrdoc::server::database::{Database, Registration};
use qrdoc::server::handlers::AppState;
use qrdoc::server::logging::REQUEST_ID_HEADER;
use qrdoc::server::routes::build_router;
use qrdoc::server::store::MemoryStore;

fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn now() -> NaiveDateTime {
    ts(2025, 6, 1)
}

/// Helper: in-memory SQLite pool with the `registrations` table.
async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory SQLite");

    sqlx::query(
        r#"
        CREATE TABLE registrations (
            id          INTEGER PRIMARY KEY,
            expiry_date TEXT,
            validation  TEXT NOT NULL DEFAULT 'valid'
        )
        "#,
    )
    .execute(&pool)
    .await
    .expect("failed to create registrations table");

    pool
}

async fn insert_registration(
    pool: &SqlitePool,
    id: i64,
    expiry: Option<NaiveDateTime>,
    validation: &str,
) {
    sqlx::query("INSERT INTO registrations (id, expiry_date, validation) VALUES (?, ?, ?)")
        .bind(id)
        .bind(expiry)
        .bind(validation)
        .execute(pool)
        .await
        .expect("failed to insert registration");
}

async fn fetch_registration(pool: &SqlitePool, id: i64) -> (Option<NaiveDateTime>, String) {
    sqlx::query_as::<_, (Option<NaiveDateTime>, String)>(
        "SELECT expiry_date, validation FROM registrations WHERE id = ?",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .expect("registration should exist")
}

fn sqlite_app(pool: &SqlitePool) -> Router {
    let db = Arc::new(Database::SQLite(pool.clone()));
    build_router(AppState::new(db, Arc::new(FixedClock(now()))))
}

fn memory_app(store: &MemoryStore) -> Router {
    build_router(AppState::new(
        Arc::new(store.clone()),
        Arc::new(FixedClock(now())),
    ))
}

struct TestResponse {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    raw: Vec<u8>,
    body: Value,
}

/// Helper to send a raw request body to the app.
async fn send(app: Router, method: &str, uri: &str, body: &str) -> TestResponse {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();

    let raw = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    let body: Value = serde_json::from_slice(&raw).unwrap_or(json!({}));

    TestResponse {
        status,
        headers,
        raw,
        body,
    }
}

async fn post_json(app: Router, body: Value) -> TestResponse {
    send(app, "POST", "/api/update_expiry", &body.to_string()).await
}

/// Comma-separated header value as lower-cased, trimmed items.
fn header_list(res: &TestResponse, name: header::HeaderName) -> Vec<String> {
    res.headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .split(',')
        .map(|item| item.trim().to_ascii_lowercase())
        .collect()
}

fn assert_cors_headers(res: &TestResponse) {
    assert_eq!(res.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        header_list(res, header::ACCESS_CONTROL_ALLOW_METHODS),
        ["post", "options"]
    );
    assert_eq!(
        header_list(res, header::ACCESS_CONTROL_ALLOW_HEADERS),
        ["content-type", "authorization", "accept"]
    );
}

#[tokio::test]
async fn expired_registration_restarts_from_now() {
    let pool = setup_pool().await;
    insert_registration(&pool, 42, Some(ts(2025, 1, 15)), "expired").await;

    let res = post_json(sqlite_app(&pool), json!({ "id": 42, "months": 3 })).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert_eq!(res.body["message"], "Validade reativada com sucesso");
    assert_eq!(
        res.body["data"],
        json!({
            "id": 42,
            "new_expiry_date": "2025-09-01 00:00:00",
            "months_added": 3,
            "validation": "valid",
            "previous_expiry": "2025-01-15 00:00:00",
            "cumulative": false
        })
    );

    let (expiry, validation) = fetch_registration(&pool, 42).await;
    assert_eq!(expiry, Some(ts(2025, 9, 1)));
    assert_eq!(validation, "valid");
}

#[tokio::test]
async fn live_registration_is_extended_cumulatively() {
    let pool = setup_pool().await;
    insert_registration(&pool, 7, Some(ts(2025, 12, 31)), "valid").await;

    let res = post_json(sqlite_app(&pool), json!({ "id": 7, "months": 1 })).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["cumulative"], true);
    assert_eq!(res.body["data"]["new_expiry_date"], "2026-01-31 00:00:00");
    assert_eq!(res.body["data"]["previous_expiry"], "2025-12-31 00:00:00");

    let (expiry, _) = fetch_registration(&pool, 7).await;
    assert_eq!(expiry, Some(ts(2026, 1, 31)));
}

#[tokio::test]
async fn repeated_extension_adds_again() {
    let pool = setup_pool().await;
    insert_registration(&pool, 3, Some(ts(2025, 1, 1)), "expired").await;
    let app = sqlite_app(&pool);

    let first = post_json(app.clone(), json!({ "id": 3, "months": 6 })).await;
    let second = post_json(app, json!({ "id": 3, "months": 6 })).await;

    assert_eq!(first.body["data"]["new_expiry_date"], "2025-12-01 00:00:00");
    assert_eq!(first.body["data"]["cumulative"], false);
    assert_eq!(second.body["data"]["new_expiry_date"], "2026-06-01 00:00:00");
    assert_eq!(second.body["data"]["cumulative"], true);
}

#[tokio::test]
async fn registration_without_expiry_starts_from_now() {
    let pool = setup_pool().await;
    insert_registration(&pool, 11, None, "invalid").await;

    let res = post_json(sqlite_app(&pool), json!({ "id": 11, "months": 1 })).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["previous_expiry"], Value::Null);
    assert_eq!(res.body["data"]["cumulative"], false);
    assert_eq!(res.body["data"]["new_expiry_date"], "2025-07-01 00:00:00");
}

#[tokio::test]
async fn numeric_strings_are_accepted() {
    let pool = setup_pool().await;
    insert_registration(&pool, 42, Some(ts(2025, 1, 15)), "expired").await;

    let res = post_json(sqlite_app(&pool), json!({ "id": "42", "months": "3" })).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["id"], 42);
    assert_eq!(res.body["data"]["months_added"], 3);
}

#[tokio::test]
async fn disallowed_periods_are_rejected_without_mutation() {
    let pool = setup_pool().await;
    insert_registration(&pool, 5, Some(ts(2025, 1, 15)), "expired").await;
    let app = sqlite_app(&pool);

    for months in [json!(0), json!(2), json!(-1), json!(12)] {
        let res = post_json(app.clone(), json!({ "id": 5, "months": months.clone() })).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "months={months}");
        assert_eq!(
            res.body,
            json!({ "error": "Período inválido. Use 1, 3 ou 6 meses" })
        );
    }

    let (expiry, validation) = fetch_registration(&pool, 5).await;
    assert_eq!(expiry, Some(ts(2025, 1, 15)));
    assert_eq!(validation, "expired");
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let pool = setup_pool().await;
    insert_registration(&pool, 1, Some(ts(2025, 1, 15)), "expired").await;

    let res = post_json(sqlite_app(&pool), json!({ "id": 999, "months": 1 })).await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, json!({ "error": "Registro não encontrado" }));

    let (expiry, _) = fetch_registration(&pool, 1).await;
    assert_eq!(expiry, Some(ts(2025, 1, 15)));
}

#[tokio::test]
async fn malformed_json_never_reaches_the_store() {
    let store = MemoryStore::new();

    let res = send(memory_app(&store), "POST", "/api/update_expiry", "{\"id\": 1,").await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body, json!({ "error": "JSON inválido" }));
    assert_eq!(store.acquisitions(), 0);
}

#[tokio::test]
async fn zero_id_counts_as_missing() {
    let store = MemoryStore::new();
    store
        .insert(Registration::new(0, Some(ts(2025, 1, 15)), "expired"))
        .unwrap();

    for id in [json!(0), json!("0")] {
        let res = post_json(memory_app(&store), json!({ "id": id.clone(), "months": 1 })).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "id={id}");
        assert_eq!(
            res.body,
            json!({ "error": "Parâmetros 'id' e 'months' são obrigatórios" })
        );
    }

    assert_eq!(store.acquisitions(), 0);
    assert_eq!(store.updates(), 0);
}

#[tokio::test]
async fn oversized_body_gets_json_error() {
    let store = MemoryStore::new();
    let padding = "x".repeat(qrdoc::server::routes::MAX_BODY_BYTES + 1);
    let body = json!({ "id": 1, "months": 1, "padding": padding }).to_string();

    let res = send(memory_app(&store), "POST", "/api/update_expiry", &body).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body, json!({ "error": "JSON inválido" }));
    assert_eq!(res.headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(store.acquisitions(), 0);
}

#[tokio::test]
async fn missing_fields_are_bad_request() {
    let store = MemoryStore::new();

    let res = post_json(memory_app(&store), json!({ "id": 1 })).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.body,
        json!({ "error": "Parâmetros 'id' e 'months' são obrigatórios" })
    );
    assert_eq!(store.acquisitions(), 0);
}

#[tokio::test]
async fn preflight_returns_empty_ok() {
    let store = MemoryStore::new();

    let res = send(memory_app(&store), "OPTIONS", "/api/update_expiry", "").await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.raw.is_empty());
    assert_cors_headers(&res);
    assert_eq!(store.acquisitions(), 0);
}

#[tokio::test]
async fn browser_preflight_is_answered_without_the_store() {
    let store = MemoryStore::new();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/update_expiry.php")
        .header(header::ORIGIN, "https://backoffice.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = memory_app(&store).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(store.acquisitions(), 0);
}

#[tokio::test]
async fn every_response_carries_cors_headers() {
    let store = MemoryStore::new();
    store
        .insert(Registration::new(42, Some(ts(2025, 1, 15)), "expired"))
        .unwrap();

    let ok = post_json(memory_app(&store), json!({ "id": 42, "months": 1 })).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_cors_headers(&ok);

    let bad = post_json(memory_app(&store), json!({ "id": 42, "months": 2 })).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_cors_headers(&bad);

    let missing = post_json(memory_app(&store), json!({ "id": 404, "months": 1 })).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_cors_headers(&missing);
}

#[tokio::test]
async fn other_methods_are_not_allowed() {
    let store = MemoryStore::new();

    for method in ["GET", "PUT", "DELETE"] {
        let res = send(memory_app(&store), method, "/api/update_expiry", "").await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
        assert_eq!(res.body, json!({ "error": "Method not allowed" }));
        assert_cors_headers(&res);
    }
}

#[tokio::test]
async fn legacy_path_serves_the_same_endpoint() {
    let store = MemoryStore::new();
    store
        .insert(Registration::new(42, Some(ts(2025, 1, 15)), "expired"))
        .unwrap();

    let res = send(
        memory_app(&store),
        "POST",
        "/api/update_expiry.php",
        r#"{"id": 42, "months": 3}"#,
    )
    .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["new_expiry_date"], "2025-09-01 00:00:00");
}

#[tokio::test]
async fn unapplied_update_is_server_error() {
    let store = MemoryStore::new();
    store
        .insert(Registration::new(8, Some(ts(2025, 1, 15)), "expired"))
        .unwrap();
    store.set_reject_updates(true);

    let res = post_json(memory_app(&store), json!({ "id": 8, "months": 1 })).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body, json!({ "error": "Erro ao atualizar registro" }));
}

#[tokio::test]
async fn store_outage_is_internal_error() {
    let store = MemoryStore::new();
    store.set_unavailable(true);

    let res = post_json(memory_app(&store), json!({ "id": 8, "months": 1 })).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = res.body["error"].as_str().unwrap();
    assert!(message.starts_with("Erro interno do servidor: "), "{message}");
}

#[tokio::test]
async fn store_error_body_names_the_cause_once() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    let res = post_json(sqlite_app(&pool), json!({ "id": 1, "months": 1 })).await;

    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        res.body,
        json!({
            "error": "Erro interno do servidor: database error: error returned from database: \
                      (code: 1) no such table: registrations"
        })
    );
}

#[tokio::test]
async fn responses_are_json_with_request_id() {
    let store = MemoryStore::new();

    let res = post_json(memory_app(&store), json!({ "id": 1, "months": 1 })).await;

    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.headers[header::CONTENT_TYPE], "application/json");
    assert!(res.headers.contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn health_reports_store_status() {
    let pool = setup_pool().await;

    let res = send(sqlite_app(&pool), "GET", "/health", "").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
    assert_eq!(res.body["database"]["db_type"], "sqlite");

    let store = MemoryStore::new();
    store.set_unavailable(true);
    let res = send(memory_app(&store), "GET", "/health", "").await;
    assert_eq!(res.body["status"], "degraded");
    assert_eq!(res.body["database"]["connected"], false);
}
