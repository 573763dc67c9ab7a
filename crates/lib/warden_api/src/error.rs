//! Response envelope and application error types.
//!
//! Every response is HTTP 200 with `{code, message, data?}`; the outcome is
//! carried by `code`, never by the HTTP status.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use serde::{Serialize, Serializer};
use thiserror::Error;
use warden_core::auth::AuthError;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Outcome code carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    ServerError,
    ParameterError,
    AuthError,
    /// Part of the client-facing code set; no route currently returns it.
    NetworkError,
    UnknownError,
}

impl ResponseCode {
    pub fn as_i32(self) -> i32 {
        match self {
            ResponseCode::Success => 0,
            ResponseCode::ServerError => 1,
            ResponseCode::ParameterError => 2,
            ResponseCode::AuthError => 3,
            ResponseCode::NetworkError => 4,
            ResponseCode::UnknownError => -1,
        }
    }
}

impl Serialize for ResponseCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

/// `{code, message, data?}` response body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: ResponseCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: ResponseCode::Success,
            message: "success".into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload.
    pub fn done() -> Self {
        Self {
            code: ResponseCode::Success,
            message: "success".into(),
            data: None,
        }
    }

    pub fn failure(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let code = self.code;
        let mut response = Json(self).into_response();
        // Read back by the production redaction layer.
        response.extensions_mut().insert(code);
        response
    }
}

/// Application-level errors with response-code mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid request body: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn code(&self) -> ResponseCode {
        match self {
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials
                | AuthError::ValidationError(_)
                | AuthError::MissingToken => ResponseCode::ParameterError,
                AuthError::TokenExpired
                | AuthError::TokenInvalid
                | AuthError::TokenRevoked
                | AuthError::StaleToken => ResponseCode::AuthError,
                AuthError::HashingFailed(_) | AuthError::StorageUnavailable(_) => {
                    ResponseCode::ServerError
                }
            },
            AppError::BadRequest(_) => ResponseCode::ParameterError,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::BadRequest(e.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        if code == ResponseCode::ServerError {
            tracing::error!(error = %self, "request failed");
        }
        ApiResponse::failure(code, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(e: AuthError) -> i32 {
        AppError::from(e).code().as_i32()
    }

    #[test]
    fn auth_errors_map_to_codes() {
        assert_eq!(code_of(AuthError::InvalidCredentials), 2);
        assert_eq!(code_of(AuthError::ValidationError("x".into())), 2);
        assert_eq!(code_of(AuthError::MissingToken), 2);
        assert_eq!(code_of(AuthError::TokenExpired), 3);
        assert_eq!(code_of(AuthError::TokenInvalid), 3);
        assert_eq!(code_of(AuthError::TokenRevoked), 3);
        assert_eq!(code_of(AuthError::StaleToken), 3);
        assert_eq!(code_of(AuthError::HashingFailed("x".into())), 1);
        assert_eq!(code_of(AuthError::StorageUnavailable("x".into())), 1);
    }

    #[test]
    fn wire_values_of_every_code() {
        let codes = [
            ResponseCode::Success,
            ResponseCode::ServerError,
            ResponseCode::ParameterError,
            ResponseCode::AuthError,
            ResponseCode::NetworkError,
            ResponseCode::UnknownError,
        ];
        let wire: Vec<i32> = codes.iter().map(|c| c.as_i32()).collect();
        assert_eq!(wire, vec![0, 1, 2, 3, 4, -1]);
    }

    #[test]
    fn envelope_shape() {
        let ok = serde_json::to_value(ApiResponse::ok(serde_json::json!({"token": "t"}))).unwrap();
        assert_eq!(ok, serde_json::json!({"code": 0, "message": "success", "data": {"token": "t"}}));

        let failed =
            serde_json::to_value(ApiResponse::failure(ResponseCode::UnknownError, "boom")).unwrap();
        assert_eq!(failed, serde_json::json!({"code": -1, "message": "boom"}));
    }
}
