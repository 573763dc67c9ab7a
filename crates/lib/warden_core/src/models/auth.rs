//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `warden_api::models`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subject claim carried by every bearer token.
pub const TOKEN_SUBJECT: &str = "BearerToken";

/// Stored credentials for one account (`user_auth_info`).
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub salt: String,
    pub password_hash: String,
}

/// Fields required to create a credential record.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub username: String,
    pub email: String,
    pub salt: String,
    pub password_hash: String,
}

/// How a login request identifies the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Email(String),
    Username(String),
}

impl Identifier {
    /// Build an identifier from the optional email/username pair of a login
    /// request. A non-empty email wins over the username.
    pub fn from_parts(email: Option<&str>, username: Option<&str>) -> Option<Self> {
        match (email, username) {
            (Some(e), _) if !e.is_empty() => Some(Identifier::Email(e.to_string())),
            (_, Some(u)) if !u.is_empty() => Some(Identifier::Username(u.to_string())),
            _ => None,
        }
    }

    /// The raw identifier value, used for logging.
    pub fn value(&self) -> &str {
        match self {
            Identifier::Email(v) | Identifier::Username(v) => v,
        }
    }
}

/// Record lookup key for a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialLookup {
    Id(Uuid),
    Email(String),
    Username(String),
}

impl From<Identifier> for CredentialLookup {
    fn from(identifier: Identifier) -> Self {
        match identifier {
            Identifier::Email(e) => CredentialLookup::Email(e),
            Identifier::Username(u) => CredentialLookup::Username(u),
        }
    }
}

/// JWT claims embedded in bearer tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Always [`TOKEN_SUBJECT`].
    pub sub: String,
    /// User ID (hyphenated UUID).
    pub uid: String,
    pub username: String,
    /// Unique token ID.
    pub jti: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Not before (unix timestamp).
    pub nbf: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
    pub iss: String,
}

impl TokenClaims {
    /// Parse the `uid` claim back into a UUID.
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.uid).ok()
    }
}

/// One login attempt (`user_login_logs`). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginEvent {
    pub id: Uuid,
    pub uid: Uuid,
    pub ip: String,
    pub location: String,
    pub device: String,
    pub time: DateTime<Utc>,
    pub application: String,
    pub if_succeed: bool,
    pub if_checked: bool,
}
