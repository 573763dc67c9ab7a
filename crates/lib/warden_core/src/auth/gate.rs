//! Per-request bearer-token check.
//!
//! Order matters: the time window is checked before ledger membership, so an
//! expired token that is still in the ledger reports [`AuthError::TokenExpired`]
//! rather than [`AuthError::TokenRevoked`].

use tracing::debug;

use super::AuthError;
use super::jwt::TokenCodec;
use crate::context::AuthContext;
use crate::ledger::TokenLedger;
use crate::models::auth::TokenClaims;

const BEARER_PREFIX: &str = "Bearer ";

/// Verified caller identity, produced once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub claims: TokenClaims,
    /// The raw token the caller presented.
    pub token: String,
}

#[derive(Clone)]
pub struct AuthGate {
    codec: TokenCodec,
    ledger: TokenLedger,
}

impl AuthGate {
    pub fn new(ctx: &AuthContext) -> Self {
        Self {
            codec: TokenCodec::new(&ctx.settings),
            ledger: TokenLedger::new(ctx),
        }
    }

    /// Authenticate from a raw `Authorization` header value.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Identity, AuthError> {
        let token = authorization
            .and_then(|h| h.strip_prefix(BEARER_PREFIX))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;
        self.check_token(token).await
    }

    /// Verify signature and time window, then ledger membership.
    pub async fn check_token(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.codec.verify(token).inspect_err(|e| {
            debug!(error = %e, "bearer token rejected");
        })?;

        if !self.ledger.contains(&claims.uid, token).await? {
            debug!(uid = %claims.uid, "bearer token not in ledger");
            return Err(AuthError::TokenRevoked);
        }

        Ok(Identity {
            claims,
            token: token.to_string(),
        })
    }
}
