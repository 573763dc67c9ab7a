//! In-process ledger backend.
//!
//! Each method holds the dashmap shard lock for its key for the whole
//! operation, which gives the same per-key atomicity as the Redis scripts.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{LedgerBackend, LedgerError};

#[derive(Debug, Default)]
pub struct MemoryLedger {
    lists: DashMap<String, Vec<String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerBackend for MemoryLedger {
    async fn range(&self, key: &str) -> Result<Vec<String>, LedgerError> {
        Ok(self.lists.get(key).map(|l| l.clone()).unwrap_or_default())
    }

    async fn position(&self, key: &str, token: &str) -> Result<Option<usize>, LedgerError> {
        Ok(self
            .lists
            .get(key)
            .and_then(|l| l.iter().position(|t| t == token)))
    }

    async fn admit_bounded(
        &self,
        key: &str,
        token: &str,
        capacity: usize,
    ) -> Result<Vec<String>, LedgerError> {
        let mut list = self.lists.entry(key.to_string()).or_default();
        let overflow = (list.len() + 1).saturating_sub(capacity).min(list.len());
        let evicted: Vec<String> = list.drain(..overflow).collect();
        list.push(token.to_string());
        Ok(evicted)
    }

    async fn replace(&self, key: &str, old: &str, new: &str) -> Result<bool, LedgerError> {
        let Some(mut list) = self.lists.get_mut(key) else {
            return Ok(false);
        };
        match list.iter_mut().find(|t| t.as_str() == old) {
            Some(slot) => {
                *slot = new.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, key: &str, token: &str) -> Result<usize, LedgerError> {
        let Some(mut list) = self.lists.get_mut(key) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|t| t != token);
        Ok(before - list.len())
    }
}
