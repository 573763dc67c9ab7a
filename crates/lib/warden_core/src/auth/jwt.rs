//! Bearer token issuing and verification (HS256).
//!
//! Verification is stateless: signature, issuer, subject and the
//! `nbf`/`exp` window. Whether the token is still admitted for its user is
//! the ledger's business.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::AuthSettings;
use crate::models::auth::{TOKEN_SUBJECT, TokenClaims};

const GENERATED_SECRET_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum CodecError {
    /// Outside the `nbf`..`exp` window.
    #[error("token expired")]
    Expired,

    /// Bad signature, structure, issuer or subject.
    #[error("token malformed: {0}")]
    Malformed(String),

    #[error("jwt encode: {0}")]
    Signing(String),
}

/// Signs and verifies bearer tokens with a shared symmetric secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: chrono::Duration,
}

impl TokenCodec {
    pub fn new(settings: &AuthSettings) -> Self {
        let secret = settings.jwt_secret.as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_issuer(&[settings.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "nbf", "iat", "iss", "sub"]);
        validation.sub = Some(TOKEN_SUBJECT.to_string());

        // Out-of-range lifetimes surface as a signing error on issue.
        let ttl = chrono::Duration::from_std(settings.token_ttl).unwrap_or(chrono::Duration::MAX);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: settings.issuer.clone(),
            ttl,
        }
    }

    /// Issue a token for `user_id`, valid from now for the configured lifetime.
    pub fn issue(&self, user_id: &str, username: &str) -> Result<(String, TokenClaims), CodecError> {
        self.issue_at(user_id, username, Utc::now())
    }

    /// Issue a token as if the clock read `now`.
    pub fn issue_at(
        &self,
        user_id: &str,
        username: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, TokenClaims), CodecError> {
        let exp = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| CodecError::Signing("token lifetime out of range".into()))?;
        let claims = TokenClaims {
            sub: TOKEN_SUBJECT.to_string(),
            uid: user_id.to_string(),
            username: username.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CodecError::Signing(e.to_string()))?;
        Ok((token, claims))
    }

    /// Verify a token, returning its claims on success.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, CodecError> {
        decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => CodecError::Expired,
                _ => CodecError::Malformed(e.to_string()),
            })
    }
}

/// Signing secret from `JWT_SECRET`, falling back to `AUTH_SECRET`.
pub fn secret_from_env() -> Option<String> {
    ["JWT_SECRET", "AUTH_SECRET"]
        .into_iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
}

/// Read the secret persisted at `path`, generating and writing one if the
/// file is missing or empty. Only meant for single-host development setups.
pub fn persisted_secret(path: &Path) -> std::io::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(existing) if !existing.trim().is_empty() => return Ok(existing.trim().to_string()),
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LEN)
        .map(char::from)
        .collect();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &secret)?;
    info!(path = %path.display(), "generated signing secret");
    Ok(secret)
}

/// Default location of the persisted development secret.
pub fn default_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warden")
        .join("jwt-secret")
}
