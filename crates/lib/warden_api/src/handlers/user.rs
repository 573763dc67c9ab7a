//! Account handlers.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::{Extension, Json};
use warden_core::auth::AuthError;

use crate::AppState;
use crate::error::{ApiResponse, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{RegisterRequest, UpdatePasswordRequest};

/// `POST /api/user/register`: create an account.
pub async fn register_handler(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<ApiResponse<()>> {
    let Json(body) = body?;
    state
        .accounts
        .register(&body.username, &body.email, &body.password)
        .await?;
    Ok(ApiResponse::done())
}

/// `POST /api/user/update/password`: change the caller's password.
pub async fn update_password_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(identity)): Extension<AuthenticatedUser>,
    body: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> AppResult<ApiResponse<()>> {
    let Json(body) = body?;
    let user_id = identity.claims.user_id().ok_or(AuthError::TokenInvalid)?;
    state
        .accounts
        .change_password(user_id, &body.old_password, &body.new_password)
        .await?;
    Ok(ApiResponse::done())
}
