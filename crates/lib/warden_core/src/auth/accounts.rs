//! Account registration and password changes.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::AuthError;
use super::password::{generate_salt, hash_password_blocking, verify_password_blocking};
use super::validation::{validate_email, validate_password, validate_username};
use crate::context::AuthContext;
use crate::models::auth::{CredentialLookup, NewCredential};
use crate::records::RecordStore;

const DUPLICATE_ACCOUNT: &str = "username or email already registered";

#[derive(Clone)]
pub struct AccountService {
    records: Arc<dyn RecordStore>,
}

impl AccountService {
    pub fn new(ctx: &AuthContext) -> Self {
        Self {
            records: ctx.records.clone(),
        }
    }

    /// Create a credential record. Returns the new user ID.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Uuid, AuthError> {
        validate_username(username)?;
        validate_email(email)?;
        validate_password(password)?;

        let mut tx = self.records.begin().await?;
        if tx.credential_exists(username, email).await? {
            return Err(AuthError::ValidationError(DUPLICATE_ACCOUNT.into()));
        }

        let salt = generate_salt();
        let password_hash = hash_password_blocking(password, &salt).await?;
        let record = tx
            .insert_credential(&NewCredential {
                username: username.to_string(),
                email: email.to_string(),
                salt,
                password_hash,
            })
            .await?;
        tx.commit().await?;

        info!(user_id = %record.id, username, "account registered");
        Ok(record.id)
    }

    /// Replace the password after verifying the current one. Sessions already
    /// in the ledger stay valid.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;

        let mut tx = self.records.begin().await?;
        let record = tx
            .find_credential(&CredentialLookup::Id(user_id))
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password_blocking(&record.password_hash, old_password, &record.salt).await?;

        let salt = generate_salt();
        let password_hash = hash_password_blocking(new_password, &salt).await?;
        tx.update_password(user_id, &salt, &password_hash).await?;
        tx.commit().await?;

        info!(user_id = %user_id, "password changed");
        Ok(())
    }
}
