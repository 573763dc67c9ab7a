//! Integration tests: build the router over in-memory stores and drive the
//! session lifecycle through HTTP.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use warden_api::config::{ApiConfig, AppEnv};
use warden_api::{AppState, router};
use warden_core::AuthContext;
use warden_core::ledger::MemoryLedger;
use warden_core::models::auth::LoginEvent;
use warden_core::records::{MemoryRecordStore, RecordError, RecordStore, RecordTransaction};

const PASSWORD: &str = "password123";

fn app_with(config: ApiConfig) -> Router {
    let ctx = AuthContext::in_memory(config.auth.clone());
    router(AppState::new(&ctx, config))
}

fn app(capacity: usize) -> Router {
    let mut config = ApiConfig::with_secret("integration-secret");
    config.auth.max_tokens_per_user = capacity;
    app_with(config)
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Value {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7")
        .header("user-agent", "curl/8.4.0");
    if let Some(token) = token {
        req = req.header("authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.expect("request");
    // Outcome is always carried in the envelope, never the HTTP status.
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("parse JSON")
}

async fn register(app: &Router) {
    let resp = call(
        app,
        "POST",
        "/api/user/register",
        None,
        Some(json!({"username": "alice", "email": "alice@example.com", "password": PASSWORD})),
    )
    .await;
    assert_eq!(resp["code"], 0, "{resp}");
}

async fn login(app: &Router) -> String {
    let resp = call(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "alice", "password": PASSWORD})),
    )
    .await;
    assert_eq!(resp["code"], 0, "{resp}");
    resp["data"]["token"]
        .as_str()
        .expect("token is string")
        .to_string()
}

async fn sessions(app: &Router, token: &str) -> Value {
    call(app, "GET", "/api/auth/sessions", Some(token), None).await
}

#[tokio::test]
async fn register_login_and_list_sessions() {
    let app = app(5);
    register(&app).await;
    let t1 = login(&app).await;
    let t2 = login(&app).await;

    let resp = sessions(&app, &t2).await;
    assert_eq!(resp["code"], 0);
    assert_eq!(resp["data"]["tokens"], 2);
    assert_eq!(resp["data"]["current_position"], 1);

    let resp = sessions(&app, &t1).await;
    assert_eq!(resp["data"]["current_position"], 0);
}

#[tokio::test]
async fn login_by_email() {
    let app = app(5);
    register(&app).await;
    let resp = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": PASSWORD})),
    )
    .await;
    assert_eq!(resp["code"], 0);
    assert!(resp["data"]["token"].is_string());
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_parameter_errors() {
    let app = app(5);
    register(&app).await;

    let wrong = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "alice", "password": "not-the-password"})),
    )
    .await;
    let unknown = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "mallory", "password": PASSWORD})),
    )
    .await;
    assert_eq!(wrong["code"], 2);
    assert_eq!(wrong, unknown);
    assert!(wrong.get("data").is_none());
}

#[tokio::test]
async fn login_without_identifier_is_parameter_error() {
    let app = app(5);
    let resp = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"password": PASSWORD})),
    )
    .await;
    assert_eq!(resp["code"], 2);
}

#[tokio::test]
async fn malformed_json_is_parameter_error() {
    let app = app(5);
    let req = Request::builder()
        .method("POST")
        .uri("/api/user/register")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], 2);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = app(5);
    register(&app).await;
    let resp = call(
        &app,
        "POST",
        "/api/user/register",
        None,
        Some(json!({"username": "alice", "email": "other@example.com", "password": PASSWORD})),
    )
    .await;
    assert_eq!(resp["code"], 2);
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = app(5);
    let missing = call(&app, "POST", "/api/auth/logout", None, None).await;
    assert_eq!(missing["code"], 2);

    let garbage = call(&app, "GET", "/api/auth/sessions", Some("not.a.jwt"), None).await;
    assert_eq!(garbage["code"], 3);
}

#[tokio::test]
async fn third_login_evicts_first_session() {
    let app = app(2);
    register(&app).await;
    let t1 = login(&app).await;
    let t2 = login(&app).await;
    let t3 = login(&app).await;

    assert_eq!(sessions(&app, &t1).await["code"], 3);
    let resp = sessions(&app, &t3).await;
    assert_eq!(resp["data"]["tokens"], 2);
    assert_eq!(sessions(&app, &t2).await["data"]["current_position"], 0);
}

#[tokio::test]
async fn logout_revokes_token_and_is_idempotent_for_the_ledger() {
    let app = app(5);
    register(&app).await;
    let token = login(&app).await;

    let resp = call(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(resp["code"], 0);

    // The gate now rejects the token before logout runs again.
    let again = call(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(again["code"], 3);
}

#[tokio::test]
async fn refresh_rotates_and_old_token_is_stale() {
    let app = app(5);
    register(&app).await;
    let old = login(&app).await;

    let resp = call(&app, "POST", "/api/auth/refresh", Some(&old), None).await;
    assert_eq!(resp["code"], 0);
    let new = resp["data"]["token"].as_str().unwrap().to_string();
    assert_ne!(new, old);

    assert_eq!(sessions(&app, &new).await["code"], 0);
    assert_eq!(sessions(&app, &old).await["code"], 3);
    let reuse = call(&app, "POST", "/api/auth/refresh", Some(&old), None).await;
    assert_eq!(reuse["code"], 3);
}

#[tokio::test]
async fn password_change_keeps_existing_sessions() {
    let app = app(5);
    register(&app).await;
    let token = login(&app).await;

    let wrong = call(
        &app,
        "POST",
        "/api/user/update/password",
        Some(&token),
        Some(json!({"old_password": "nope-nope", "new_password": "newpassword1"})),
    )
    .await;
    assert_eq!(wrong["code"], 2);

    let resp = call(
        &app,
        "POST",
        "/api/user/update/password",
        Some(&token),
        Some(json!({"old_password": PASSWORD, "new_password": "newpassword1"})),
    )
    .await;
    assert_eq!(resp["code"], 0);
    assert_eq!(sessions(&app, &token).await["code"], 0);

    let resp = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "alice", "password": "newpassword1"})),
    )
    .await;
    assert_eq!(resp["code"], 0);
}

/// Record store that is always down.
struct Unreachable;

#[async_trait::async_trait]
impl RecordStore for Unreachable {
    async fn begin(&self) -> Result<Box<dyn RecordTransaction>, RecordError> {
        Err(RecordError::Database(sqlx::Error::PoolTimedOut))
    }
}

fn unreachable_app(app_env: AppEnv) -> Router {
    let mut config = ApiConfig::with_secret("integration-secret");
    config.app_env = app_env;
    let ctx = AuthContext::new(
        Arc::new(Unreachable),
        Arc::new(MemoryLedger::new()),
        Arc::new(warden_core::geo::NoopLocator),
        config.auth.clone(),
    );
    router(AppState::new(&ctx, config))
}

#[tokio::test]
async fn server_errors_carry_detail_in_development() {
    let app = unreachable_app(AppEnv::Development);
    let resp = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "alice", "password": PASSWORD})),
    )
    .await;
    assert_eq!(resp["code"], 1);
    assert!(!resp["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn server_errors_are_blanked_in_production() {
    let app = unreachable_app(AppEnv::Production);
    let resp = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "alice", "password": PASSWORD})),
    )
    .await;
    assert_eq!(resp, json!({"code": 1, "message": ""}));
}

#[tokio::test]
async fn production_keeps_client_error_messages() {
    let mut config = ApiConfig::with_secret("integration-secret");
    config.app_env = AppEnv::Production;
    let app = app_with(config);
    let resp = call(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({"username": "mallory", "password": PASSWORD})),
    )
    .await;
    assert_eq!(resp["code"], 2);
    assert_eq!(resp["message"], "Invalid credentials");
}

async fn login_events_for(config: ApiConfig) -> Vec<LoginEvent> {
    let records = MemoryRecordStore::new();
    let mut ctx = AuthContext::in_memory(config.auth.clone());
    ctx.records = Arc::new(records.clone());
    let app = router(AppState::new(&ctx, config));

    register(&app).await;
    login(&app).await;
    records.login_events().await
}

#[tokio::test]
async fn memory_store_sees_login_events_from_http() {
    let mut config = ApiConfig::with_secret("integration-secret");
    config.trust_proxy_headers = true;

    let events = login_events_for(config).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].ip, "203.0.113.7");
    assert_eq!(events[0].application, "curl 8.4.0");
    assert!(events[0].if_succeed);
}

#[tokio::test]
async fn forwarded_for_is_ignored_without_trusted_proxy() {
    let events = login_events_for(ApiConfig::with_secret("integration-secret")).await;
    assert_eq!(events.len(), 1);
    // No socket peer under oneshot, and the spoofable header is not honoured.
    assert_eq!(events[0].ip, "unknown");
}
