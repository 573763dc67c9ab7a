//! Session handlers: login, logout, refresh and session listing.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::USER_AGENT;
use axum::{Extension, Json};
use warden_core::auth::AuthError;
use warden_core::auth::coordinator::ClientInfo;
use warden_core::models::auth::Identifier;

use crate::AppState;
use crate::error::{ApiResponse, AppResult};
use crate::extract::ClientIp;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{LoginRequest, SessionsResponse, TokenResponse};

/// `POST /api/auth/login`: authenticate with email or username + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<ApiResponse<TokenResponse>> {
    let Json(body) = body?;
    let identifier = Identifier::from_parts(body.email.as_deref(), body.username.as_deref())
        .ok_or_else(|| AuthError::ValidationError("email or username is required".into()))?;

    let client = ClientInfo {
        ip,
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    };
    let token = state
        .coordinator
        .login(identifier, &body.password, &client)
        .await?;
    Ok(ApiResponse::ok(TokenResponse { token }))
}

/// `POST /api/auth/logout`: revoke the presented token.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
) -> AppResult<ApiResponse<()>> {
    state
        .coordinator
        .logout(&identity.claims, &identity.token)
        .await?;
    Ok(ApiResponse::done())
}

/// `POST /api/auth/refresh`: rotate the presented token.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
) -> AppResult<ApiResponse<TokenResponse>> {
    let token = state
        .coordinator
        .refresh_token(
            &identity.claims.uid,
            &identity.claims.username,
            &identity.token,
        )
        .await?;
    Ok(ApiResponse::ok(TokenResponse { token }))
}

/// `GET /api/auth/sessions`: count the caller's live sessions.
pub async fn sessions_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
) -> AppResult<ApiResponse<SessionsResponse>> {
    let summary = state.coordinator.session_summary(&identity).await?;
    Ok(ApiResponse::ok(SessionsResponse {
        tokens: summary.tokens,
        current_position: summary.current_position,
    }))
}
