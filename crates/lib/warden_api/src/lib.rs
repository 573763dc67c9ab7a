//! # warden_api
//!
//! HTTP API library for Warden.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

use std::any::Any;

use axum::Router;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use warden_core::AuthContext;
use warden_core::auth::accounts::AccountService;
use warden_core::auth::coordinator::AuthCoordinator;
use warden_core::auth::gate::AuthGate;

use crate::config::ApiConfig;
use crate::error::{ApiResponse, ResponseCode};
use crate::handlers::{auth, user};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: AuthCoordinator,
    pub gate: AuthGate,
    pub accounts: AccountService,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(ctx: &AuthContext, config: ApiConfig) -> Self {
        Self {
            coordinator: AuthCoordinator::new(ctx),
            gate: AuthGate::new(ctx),
            accounts: AccountService::new(ctx),
            config,
        }
    }
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("handler panicked");
    ApiResponse::failure(ResponseCode::UnknownError, "unexpected error").into_response()
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_USER_REGISTER, post(user::register_handler));

    // Protected routes (require a ledger-admitted bearer token)
    let protected = Router::new()
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::GET_AUTH_SESSIONS, get(auth::sessions_handler))
        .route(
            routes::POST_USER_UPDATE_PASSWORD,
            post(user::update_password_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let mut app = Router::new()
        .merge(public)
        .merge(protected)
        .layer(CatchPanicLayer::custom(panic_response));

    if state.config.app_env.is_production() {
        app = app.layer(axum::middleware::from_fn(
            middleware::redact::suppress_server_detail,
        ));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
