//! Authentication and session logic.
//!
//! Password hashing, bearer-token signing, the login/logout/refresh flows and
//! the per-request gate check. Shared by `warden_api` handlers and middleware.

pub mod accounts;
pub mod coordinator;
pub mod gate;
pub mod jwt;
pub mod password;
pub mod validation;

use std::time::Duration;

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::records::RecordError;
use jwt::CodecError;
use password::PasswordError;

/// Default bearer token lifetime: 7 days.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Longest accepted bearer token lifetime: 1 year.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default token issuer.
pub const DEFAULT_TOKEN_ISSUER: &str = "warden.auth";

/// Default number of concurrently valid sessions per user.
pub const DEFAULT_MAX_TOKENS_PER_USER: usize = 5;

/// Default budget for the best-effort geolocation lookup.
pub const DEFAULT_GEO_TIMEOUT: Duration = Duration::from_millis(1500);

/// Authentication errors surfaced to controllers and middleware.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Missing bearer token")]
    MissingToken,

    #[error("Bearer token expired")]
    TokenExpired,

    #[error("Bearer token invalid")]
    TokenInvalid,

    #[error("Bearer token revoked")]
    TokenRevoked,

    #[error("Bearer token already rotated or revoked")]
    StaleToken,

    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl AuthError {
    /// Whether this is a server-side failure rather than a caller mistake.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AuthError::HashingFailed(_) | AuthError::StorageUnavailable(_)
        )
    }
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::CredentialMismatch => AuthError::InvalidCredentials,
            PasswordError::HashingFailed(msg) => AuthError::HashingFailed(msg),
        }
    }
}

impl From<CodecError> for AuthError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Expired => AuthError::TokenExpired,
            CodecError::Malformed(_) => AuthError::TokenInvalid,
            CodecError::Signing(msg) => AuthError::HashingFailed(format!("token signing: {msg}")),
        }
    }
}

impl From<LedgerError> for AuthError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound => AuthError::StaleToken,
            LedgerError::Unavailable(msg) => AuthError::StorageUnavailable(msg),
        }
    }
}

impl From<RecordError> for AuthError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Conflict(msg) => AuthError::ValidationError(msg),
            other => AuthError::StorageUnavailable(other.to_string()),
        }
    }
}

/// Token and session settings consumed by the codec, ledger and coordinator.
#[derive(Clone)]
pub struct AuthSettings {
    /// HMAC signing secret. Supplied by configuration, never compiled in.
    pub jwt_secret: String,
    /// Bearer token lifetime.
    pub token_ttl: Duration,
    /// `iss` claim written on issue and required on verify.
    pub issuer: String,
    /// Ledger capacity per user.
    pub max_tokens_per_user: usize,
    /// Upper bound on the geolocation lookup during login.
    pub geo_timeout: Duration,
}

impl AuthSettings {
    /// Settings with defaults for everything but the secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl: DEFAULT_TOKEN_TTL,
            issuer: DEFAULT_TOKEN_ISSUER.to_string(),
            max_tokens_per_user: DEFAULT_MAX_TOKENS_PER_USER,
            geo_timeout: DEFAULT_GEO_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("issuer", &self.issuer)
            .field("max_tokens_per_user", &self.max_tokens_per_user)
            .field("geo_timeout", &self.geo_timeout)
            .finish()
    }
}
