//! Transactional access to credential records and login events.
//!
//! A [`RecordTransaction`] that is dropped without [`RecordTransaction::commit`]
//! is rolled back, so every early return, `?` or panic releases it.

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;

use crate::models::auth::{CredentialLookup, CredentialRecord, LoginEvent, NewCredential};

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unique constraint hit (username or email taken).
    #[error("{0}")]
    Conflict(String),

    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Entry point to the primary record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Start a transaction.
    async fn begin(&self) -> Result<Box<dyn RecordTransaction>, RecordError>;
}

/// Operations available inside one record-store transaction.
#[async_trait]
pub trait RecordTransaction: Send {
    async fn find_credential(
        &mut self,
        lookup: &CredentialLookup,
    ) -> Result<Option<CredentialRecord>, RecordError>;

    /// Whether `username` or `email` is already registered.
    async fn credential_exists(&mut self, username: &str, email: &str) -> Result<bool, RecordError>;

    async fn insert_credential(
        &mut self,
        credential: &NewCredential,
    ) -> Result<CredentialRecord, RecordError>;

    async fn update_password(
        &mut self,
        user_id: Uuid,
        salt: &str,
        password_hash: &str,
    ) -> Result<(), RecordError>;

    /// Append a login event. Events are never updated.
    async fn insert_login_event(&mut self, event: &LoginEvent) -> Result<(), RecordError>;

    async fn commit(self: Box<Self>) -> Result<(), RecordError>;
}
