//! Production-mode suppression of server-error detail.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::{ApiResponse, ResponseCode};

/// Replaces the body of any `SERVER_ERROR` envelope with one whose message
/// is empty. Installed only in production.
pub async fn suppress_server_detail(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    match response.extensions().get::<ResponseCode>() {
        Some(ResponseCode::ServerError) => {
            ApiResponse::failure(ResponseCode::ServerError, "").into_response()
        }
        _ => response,
    }
}
