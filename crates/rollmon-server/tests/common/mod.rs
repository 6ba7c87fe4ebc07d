#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use rollmon_server::app;
use rollmon_server::config::ServerConfig;
use rollmon_server::state::AppState;
use rollmon_storage::memory::MemoryStore;
use rollmon_storage::sqlite::SqliteStore;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

/// `(user id, role)` sent as `x-user-id` / `x-user-role`.
pub type Identity<'a> = (&'a str, Option<&'a str>);

pub const SUPERVISOR: Identity<'static> = ("sup-1", Some("Supervisor"));
pub const OPERATOR: Identity<'static> = ("op-1", Some("Operator"));
pub const OTHER_OPERATOR: Identity<'static> = ("op-2", Some("Operator"));

pub struct TestContext {
    pub state: AppState,
    pub app: axum::Router,
    /// Keeps the SQLite file alive for the test's duration.
    pub temp_dir: Option<TempDir>,
}

pub fn build_test_context() -> TestContext {
    build_test_context_with(ServerConfig::default())
}

pub fn build_test_context_with(config: ServerConfig) -> TestContext {
    let state = AppState::new(Arc::new(MemoryStore::new()), config);
    let app = app::build_http_app(state.clone());
    TestContext {
        state,
        app,
        temp_dir: None,
    }
}

pub fn build_sqlite_test_context() -> anyhow::Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let store = SqliteStore::open(&temp_dir.path().join("rollmon.db"))?;
    let state = AppState::new(Arc::new(store), ServerConfig::default());
    let app = app::build_http_app(state.clone());
    Ok(TestContext {
        state,
        app,
        temp_dir: Some(temp_dir),
    })
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    identity: Option<Identity<'_>>,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user_id, role)) = identity {
        builder = builder.header("x-user-id", user_id);
        if let Some(role) = role {
            builder = builder.header("x-user-role", role);
        }
    }

    let req = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    identity: Option<Identity<'_>>,
) -> (StatusCode, Value, Option<String>) {
    request_json(app, method, uri, identity, None).await
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["err_code"], 0);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
}

pub fn assert_err_envelope(json: &Value, err_code: i32) {
    assert_eq!(json["err_code"], err_code);
    assert!(json["err_msg"].is_string());
    assert!(json.get("trace_id").is_some());
    assert!(json.get("data").is_some());
    assert!(json["data"].is_null());
}

pub fn decode_data<T: DeserializeOwned>(json: &Value) -> T {
    serde_json::from_value(json["data"].clone()).expect("data should decode")
}

/// Extruding, day shift, section `EXT01`, any machine.
pub fn ext01_target() -> Value {
    json!({
        "section_id": "EXT01",
        "stage": "extruding",
        "shift": "day",
        "target_rate": 100.0,
        "min_efficiency": 80.0,
        "max_downtime_minutes": 30.0
    })
}

/// Violates all three rules against [`ext01_target`].
pub fn ext01_bad_metric() -> Value {
    json!({
        "section_id": "EXT01",
        "machine_id": "EXT01-M2",
        "job_order_id": "JO-1001",
        "stage": "extruding",
        "shift": "day",
        "target_rate": 100.0,
        "actual_rate": 40.0,
        "efficiency": 45.0,
        "downtime_minutes": 70.0,
        "operator_id": "op-1"
    })
}

pub async fn create_target(app: &axum::Router, body: Value) -> i64 {
    let (status, json, _) = request_json(app, "POST", "/v1/targets", Some(SUPERVISOR), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "target create failed: {json}");
    json["data"]["id"].as_i64().expect("target id")
}

pub async fn submit_metric(app: &axum::Router, body: Value) -> Value {
    let (status, json, _) = request_json(app, "POST", "/v1/metrics", Some(OPERATOR), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "metric submit failed: {json}");
    json["data"].clone()
}

pub async fn create_template(app: &axum::Router, body: Value) -> i64 {
    let (status, json, _) =
        request_json(app, "POST", "/v1/templates", Some(SUPERVISOR), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "template create failed: {json}");
    json["data"]["id"].as_i64().expect("template id")
}

pub async fn create_notification(app: &axum::Router, body: Value) -> Value {
    let (status, json, _) =
        request_json(app, "POST", "/v1/notifications", Some(SUPERVISOR), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "notification create failed: {json}");
    json["data"].clone()
}

/// Ids of the caller's notifications in list order.
pub async fn inbox_ids(app: &axum::Router, identity: Identity<'_>, query: &str) -> Vec<i64> {
    let uri = if query.is_empty() {
        "/v1/notifications".to_string()
    } else {
        format!("/v1/notifications?{query}")
    };
    let (status, json, _) = request_no_body(app, "GET", &uri, Some(identity)).await;
    assert_eq!(status, StatusCode::OK, "inbox listing failed: {json}");
    json["data"]["items"]
        .as_array()
        .expect("items should be an array")
        .iter()
        .map(|n| n["id"].as_i64().expect("notification id"))
        .collect()
}
