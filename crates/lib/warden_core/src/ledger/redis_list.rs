//! Redis ledger backend.
//!
//! Admission and replacement are Lua scripts so Redis evaluates each one as a
//! single step; removal (`LREM`) and membership (`LPOS`) are atomic already.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use super::{LedgerBackend, LedgerError};

/// KEYS[1] = list, ARGV[1] = capacity, ARGV[2] = token.
const ADMIT_SCRIPT: &str = r"
local cap = tonumber(ARGV[1])
local len = redis.call('LLEN', KEYS[1])
local evicted = {}
while len >= cap do
  local t = redis.call('LPOP', KEYS[1])
  if not t then break end
  table.insert(evicted, t)
  len = len - 1
end
redis.call('RPUSH', KEYS[1], ARGV[2])
return evicted
";

/// KEYS[1] = list, ARGV[1] = old token, ARGV[2] = new token.
const REPLACE_SCRIPT: &str = r"
local items = redis.call('LRANGE', KEYS[1], 0, -1)
for i, t in ipairs(items) do
  if t == ARGV[1] then
    redis.call('LSET', KEYS[1], i - 1, ARGV[2])
    return 1
  end
end
return 0
";

/// Ledger stored as Redis lists.
#[derive(Clone)]
pub struct RedisLedger {
    conn: ConnectionManager,
    admit: Script,
    replace: Script,
}

impl RedisLedger {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            admit: Script::new(ADMIT_SCRIPT),
            replace: Script::new(REPLACE_SCRIPT),
        }
    }

    /// Open a managed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, LedgerError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl LedgerBackend for RedisLedger {
    async fn range(&self, key: &str) -> Result<Vec<String>, LedgerError> {
        let mut conn = self.conn.clone();
        let items: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(items)
    }

    async fn position(&self, key: &str, token: &str) -> Result<Option<usize>, LedgerError> {
        let mut conn = self.conn.clone();
        let pos: Option<usize> = redis::cmd("LPOS")
            .arg(key)
            .arg(token)
            .query_async(&mut conn)
            .await?;
        Ok(pos)
    }

    async fn admit_bounded(
        &self,
        key: &str,
        token: &str,
        capacity: usize,
    ) -> Result<Vec<String>, LedgerError> {
        let mut conn = self.conn.clone();
        let evicted: Vec<String> = self
            .admit
            .key(key)
            .arg(capacity)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;
        Ok(evicted)
    }

    async fn replace(&self, key: &str, old: &str, new: &str) -> Result<bool, LedgerError> {
        let mut conn = self.conn.clone();
        let replaced: i64 = self
            .replace
            .key(key)
            .arg(old)
            .arg(new)
            .invoke_async(&mut conn)
            .await?;
        Ok(replaced == 1)
    }

    async fn remove(&self, key: &str, token: &str) -> Result<usize, LedgerError> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.lrem(key, 0, token).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TokenLedger;
    use std::sync::Arc;

    async fn ledger(capacity: usize) -> TokenLedger {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let backend = RedisLedger::connect(&url).await.expect("connect to redis");
        TokenLedger::with_backend(Arc::new(backend), capacity)
    }

    fn user() -> String {
        format!("test-{}", uuid::Uuid::new_v4())
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    async fn scripts_evict_and_replace_in_place() {
        let ledger = ledger(2).await;
        let u = user();
        ledger.admit(&u, "t1").await.unwrap();
        ledger.admit(&u, "t2").await.unwrap();
        assert_eq!(ledger.admit(&u, "t3").await.unwrap(), vec!["t1"]);
        assert_eq!(ledger.list(&u).await.unwrap(), vec!["t2", "t3"]);

        ledger.replace(&u, "t2", "t2b").await.unwrap();
        assert_eq!(ledger.position(&u, "t2b").await.unwrap(), Some(0));
        assert!(ledger.replace(&u, "t2", "x").await.is_err());

        ledger.remove(&u, "t2b").await.unwrap();
        ledger.remove(&u, "t2b").await.unwrap();
        assert_eq!(ledger.list(&u).await.unwrap(), vec!["t3"]);
        ledger.remove(&u, "t3").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    async fn concurrent_admissions_stay_bounded() {
        let ledger = ledger(5).await;
        let u = user();
        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let ledger = ledger.clone();
                let u = u.clone();
                tokio::spawn(async move { ledger.admit(&u, &format!("t{i}")).await.unwrap() })
            })
            .collect();
        let mut evicted = 0;
        for t in tasks {
            evicted += t.await.unwrap().len();
        }
        let list = ledger.list(&u).await.unwrap();
        assert_eq!(list.len(), 5);
        assert_eq!(evicted + list.len(), 40);
        for t in list {
            ledger.remove(&u, &t).await.unwrap();
        }
    }
}
