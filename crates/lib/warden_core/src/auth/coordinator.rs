//! Login, logout and refresh.
//!
//! The record store and the ledger share no transaction. Login reads the
//! credential and writes its login event in one record-store transaction;
//! ledger admission happens in between, against the ledger store. If the
//! event cannot be committed after admission, the admitted token is removed
//! again so a failed login never leaves a usable token behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use super::gate::Identity;
use super::jwt::TokenCodec;
use super::password::{PasswordError, verify_decoy, verify_password_blocking};
use crate::context::AuthContext;
use crate::geo::GeoLocator;
use crate::ledger::TokenLedger;
use crate::models::auth::{CredentialLookup, Identifier, LoginEvent, TokenClaims};
use crate::records::{RecordStore, RecordTransaction};
use crate::useragent::ClientAgent;

/// Where a login attempt came from.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

/// Caller's view of their own sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Number of admitted tokens.
    pub tokens: usize,
    /// Position of the presented token, 0 = oldest.
    pub current_position: Option<usize>,
}

#[derive(Clone)]
pub struct AuthCoordinator {
    records: Arc<dyn RecordStore>,
    geo: Arc<dyn GeoLocator>,
    codec: TokenCodec,
    ledger: TokenLedger,
    geo_timeout: Duration,
}

impl AuthCoordinator {
    pub fn new(ctx: &AuthContext) -> Self {
        Self {
            records: ctx.records.clone(),
            geo: ctx.geo.clone(),
            codec: TokenCodec::new(&ctx.settings),
            ledger: TokenLedger::new(ctx),
            geo_timeout: ctx.settings.geo_timeout,
        }
    }

    /// Verify credentials, admit a fresh token and record the attempt.
    pub async fn login(
        &self,
        identifier: Identifier,
        password: &str,
        client: &ClientInfo,
    ) -> Result<String, AuthError> {
        let mut tx = self.records.begin().await?;

        let shown = identifier.value().to_string();
        let Some(record) = tx
            .find_credential(&CredentialLookup::from(identifier))
            .await?
        else {
            // Same bcrypt cost as a wrong password, so timing does not reveal
            // which accounts exist.
            verify_decoy(password).await;
            warn!(identifier = %shown, "login for unknown account");
            return Err(AuthError::InvalidCredentials);
        };
        let user_id = record.id.to_string();

        match verify_password_blocking(&record.password_hash, password, &record.salt).await {
            Ok(()) => {}
            Err(PasswordError::CredentialMismatch) => {
                let event = self.login_event(&record.id, client, None, false);
                tx.insert_login_event(&event).await?;
                tx.commit().await?;
                warn!(user_id, ip = %client.ip, "login failed: wrong password");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        }

        let (token, _) = self.codec.issue(&user_id, &record.username)?;
        self.ledger.admit(&user_id, &token).await?;

        let location = self.locate(&client.ip).await;
        let event = self.login_event(&record.id, client, location, true);
        if let Err(e) = record_and_commit(tx, &event).await {
            if let Err(undo) = self.ledger.remove(&user_id, &token).await {
                warn!(user_id, error = %undo, "could not withdraw token after failed login");
            }
            return Err(e);
        }

        info!(user_id, username = %record.username, ip = %client.ip, "login");
        Ok(token)
    }

    /// Withdraw `token` from the caller's ledger. Absent tokens are fine.
    pub async fn logout(&self, claims: &TokenClaims, token: &str) -> Result<(), AuthError> {
        self.ledger.remove(&claims.uid, token).await?;
        info!(user_id = %claims.uid, "logout");
        Ok(())
    }

    /// Issue a new token and swap it into `old_token`'s ledger slot.
    ///
    /// The new token takes the old one's position in eviction order; it is not
    /// moved to the newest end.
    pub async fn refresh_token(
        &self,
        user_id: &str,
        username: &str,
        old_token: &str,
    ) -> Result<String, AuthError> {
        let (token, _) = self.codec.issue(user_id, username)?;
        self.ledger.replace(user_id, old_token, &token).await?;
        info!(user_id, "token refreshed");
        Ok(token)
    }

    pub async fn session_summary(&self, identity: &Identity) -> Result<SessionSummary, AuthError> {
        let tokens = self.ledger.list(&identity.claims.uid).await?;
        Ok(SessionSummary {
            tokens: tokens.len(),
            current_position: tokens.iter().position(|t| *t == identity.token),
        })
    }

    async fn locate(&self, ip: &str) -> Option<String> {
        match tokio::time::timeout(self.geo_timeout, self.geo.locate(ip)).await {
            Ok(Ok(location)) => location,
            Ok(Err(e)) => {
                debug!(ip, error = %e, "geolocation failed");
                None
            }
            Err(_) => {
                debug!(ip, "geolocation timed out");
                None
            }
        }
    }

    fn login_event(
        &self,
        uid: &Uuid,
        client: &ClientInfo,
        location: Option<String>,
        succeeded: bool,
    ) -> LoginEvent {
        let agent = ClientAgent::parse(&client.user_agent);
        LoginEvent {
            id: Uuid::now_v7(),
            uid: *uid,
            ip: client.ip.clone(),
            location: location.unwrap_or_default(),
            device: agent.device,
            time: Utc::now(),
            application: agent.application,
            if_succeed: succeeded,
            if_checked: false,
        }
    }
}

async fn record_and_commit(
    mut tx: Box<dyn RecordTransaction>,
    event: &LoginEvent,
) -> Result<(), AuthError> {
    tx.insert_login_event(event).await?;
    tx.commit().await?;
    Ok(())
}
