//! Per-user bounded token ledger.
//!
//! Each user owns an ordered list of currently admitted bearer tokens,
//! oldest first, stored under `AUTH:TOKENS:<user_id>`. The list is the
//! revocation source of truth: a correctly signed token that is not in its
//! user's list is treated as revoked.
//!
//! Every mutating operation is a single atomic step on the backend. In
//! particular admission (read length, evict from the head, append) never
//! runs as client-side read-modify-write, so concurrent logins for one user
//! cannot push the list past its capacity.

mod memory;
mod redis_list;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use memory::MemoryLedger;
pub use redis_list::RedisLedger;

use crate::context::AuthContext;

/// Key prefix of the per-user token lists.
pub const LEDGER_KEY_PREFIX: &str = "AUTH:TOKENS";

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Token to replace is not in the list.
    #[error("token not found in ledger")]
    NotFound,

    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
}

impl From<redis::RedisError> for LedgerError {
    fn from(e: redis::RedisError) -> Self {
        LedgerError::Unavailable(e.to_string())
    }
}

/// Ordered-list store backing the ledger.
///
/// Implementations must evaluate each method atomically per key.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// All entries, oldest first. Missing key is an empty list.
    async fn range(&self, key: &str) -> Result<Vec<String>, LedgerError>;

    /// Index of the first entry equal to `token`.
    async fn position(&self, key: &str, token: &str) -> Result<Option<usize>, LedgerError>;

    /// Pop from the head while `len >= capacity`, then append `token`.
    /// Returns the popped entries, oldest first.
    async fn admit_bounded(
        &self,
        key: &str,
        token: &str,
        capacity: usize,
    ) -> Result<Vec<String>, LedgerError>;

    /// Overwrite the first entry equal to `old` with `new`, keeping its
    /// position. Returns `false` when `old` is absent.
    async fn replace(&self, key: &str, old: &str, new: &str) -> Result<bool, LedgerError>;

    /// Remove every entry equal to `token`. Returns how many were removed.
    async fn remove(&self, key: &str, token: &str) -> Result<usize, LedgerError>;
}

/// Capacity-bounded, per-user sequence of valid tokens.
#[derive(Clone)]
pub struct TokenLedger {
    backend: Arc<dyn LedgerBackend>,
    capacity: usize,
}

impl TokenLedger {
    pub fn new(ctx: &AuthContext) -> Self {
        Self::with_backend(ctx.ledger.clone(), ctx.settings.max_tokens_per_user)
    }

    pub fn with_backend(backend: Arc<dyn LedgerBackend>, capacity: usize) -> Self {
        Self {
            backend,
            capacity: capacity.max(1),
        }
    }

    /// Configured per-user capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store key for `user_id`.
    pub fn key(user_id: &str) -> String {
        format!("{LEDGER_KEY_PREFIX}:{user_id}")
    }

    /// Admitted tokens for `user_id`, oldest first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<String>, LedgerError> {
        self.backend.range(&Self::key(user_id)).await
    }

    /// Whether `token` is currently admitted for `user_id`.
    pub async fn contains(&self, user_id: &str, token: &str) -> Result<bool, LedgerError> {
        Ok(self.position(user_id, token).await?.is_some())
    }

    /// Position of `token` in the user's list (0 = oldest).
    pub async fn position(&self, user_id: &str, token: &str) -> Result<Option<usize>, LedgerError> {
        self.backend.position(&Self::key(user_id), token).await
    }

    /// Admit `token` with the configured capacity.
    pub async fn admit(&self, user_id: &str, token: &str) -> Result<Vec<String>, LedgerError> {
        self.admit_with_bound(user_id, token, self.capacity).await
    }

    /// Admit `token`, evicting the oldest entries first if the list is full.
    /// Returns the evicted tokens.
    pub async fn admit_with_bound(
        &self,
        user_id: &str,
        token: &str,
        capacity: usize,
    ) -> Result<Vec<String>, LedgerError> {
        let evicted = self
            .backend
            .admit_bounded(&Self::key(user_id), token, capacity.max(1))
            .await?;
        if !evicted.is_empty() {
            info!(user_id, evicted = evicted.len(), "evicted oldest sessions");
        }
        Ok(evicted)
    }

    /// Swap `old` for `new` in place. Fails with [`LedgerError::NotFound`]
    /// when `old` has already been rotated, revoked or evicted.
    pub async fn replace(&self, user_id: &str, old: &str, new: &str) -> Result<(), LedgerError> {
        if self.backend.replace(&Self::key(user_id), old, new).await? {
            Ok(())
        } else {
            Err(LedgerError::NotFound)
        }
    }

    /// Drop `token` from the user's list. Absent tokens are not an error.
    pub async fn remove(&self, user_id: &str, token: &str) -> Result<(), LedgerError> {
        self.backend.remove(&Self::key(user_id), token).await?;
        Ok(())
    }
}

/// Backend for a ledger store that cannot be reached.
#[cfg(test)]
pub(crate) struct UnreachableLedger;

#[cfg(test)]
#[async_trait]
impl LedgerBackend for UnreachableLedger {
    async fn range(&self, _key: &str) -> Result<Vec<String>, LedgerError> {
        Err(refused())
    }

    async fn position(&self, _key: &str, _token: &str) -> Result<Option<usize>, LedgerError> {
        Err(refused())
    }

    async fn admit_bounded(
        &self,
        _key: &str,
        _token: &str,
        _capacity: usize,
    ) -> Result<Vec<String>, LedgerError> {
        Err(refused())
    }

    async fn replace(&self, _key: &str, _old: &str, _new: &str) -> Result<bool, LedgerError> {
        Err(refused())
    }

    async fn remove(&self, _key: &str, _token: &str) -> Result<usize, LedgerError> {
        Err(refused())
    }
}

#[cfg(test)]
fn refused() -> LedgerError {
    LedgerError::Unavailable("connection refused".into())
}
