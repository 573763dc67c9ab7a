//! In-process record store.
//!
//! Reads see committed state; writes are buffered in the transaction and
//! applied together on commit. Dropping the transaction discards them.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{RecordError, RecordStore, RecordTransaction};
use crate::models::auth::{CredentialLookup, CredentialRecord, LoginEvent, NewCredential};

#[derive(Debug, Default)]
struct State {
    credentials: Vec<CredentialRecord>,
    login_events: Vec<LoginEvent>,
}

impl State {
    fn find(&self, lookup: &CredentialLookup) -> Option<&CredentialRecord> {
        self.credentials.iter().find(|c| match lookup {
            CredentialLookup::Id(id) => c.id == *id,
            CredentialLookup::Email(email) => &c.email == email,
            CredentialLookup::Username(username) => &c.username == username,
        })
    }

    fn taken(&self, username: &str, email: &str) -> bool {
        self.credentials
            .iter()
            .any(|c| c.username == username || c.email == email)
    }
}

#[derive(Debug)]
enum PendingWrite {
    Credential(CredentialRecord),
    Password {
        user_id: Uuid,
        salt: String,
        password_hash: String,
    },
    LoginEvent(LoginEvent),
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    state: Arc<Mutex<State>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed login events, oldest first.
    pub async fn login_events(&self) -> Vec<LoginEvent> {
        self.state.lock().await.login_events.clone()
    }

    /// Committed credential record, if any.
    pub async fn credential(&self, lookup: &CredentialLookup) -> Option<CredentialRecord> {
        self.state.lock().await.find(lookup).cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn begin(&self) -> Result<Box<dyn RecordTransaction>, RecordError> {
        Ok(Box::new(MemoryTransaction {
            state: self.state.clone(),
            pending: Vec::new(),
        }))
    }
}

struct MemoryTransaction {
    state: Arc<Mutex<State>>,
    pending: Vec<PendingWrite>,
}

impl MemoryTransaction {
    fn pending_credential(&self, lookup: &CredentialLookup) -> Option<CredentialRecord> {
        self.pending.iter().rev().find_map(|w| match w {
            PendingWrite::Credential(c) => {
                let hit = match lookup {
                    CredentialLookup::Id(id) => c.id == *id,
                    CredentialLookup::Email(email) => &c.email == email,
                    CredentialLookup::Username(username) => &c.username == username,
                };
                hit.then(|| c.clone())
            }
            _ => None,
        })
    }
}

#[async_trait]
impl RecordTransaction for MemoryTransaction {
    async fn find_credential(
        &mut self,
        lookup: &CredentialLookup,
    ) -> Result<Option<CredentialRecord>, RecordError> {
        if let Some(c) = self.pending_credential(lookup) {
            return Ok(Some(c));
        }
        Ok(self.state.lock().await.find(lookup).cloned())
    }

    async fn credential_exists(&mut self, username: &str, email: &str) -> Result<bool, RecordError> {
        let pending = self.pending.iter().any(|w| {
            matches!(w, PendingWrite::Credential(c) if c.username == username || c.email == email)
        });
        Ok(pending || self.state.lock().await.taken(username, email))
    }

    async fn insert_credential(
        &mut self,
        credential: &NewCredential,
    ) -> Result<CredentialRecord, RecordError> {
        if self
            .credential_exists(&credential.username, &credential.email)
            .await?
        {
            return Err(RecordError::Conflict(
                "username or email already registered".into(),
            ));
        }
        let record = CredentialRecord {
            id: Uuid::now_v7(),
            username: credential.username.clone(),
            email: credential.email.clone(),
            salt: credential.salt.clone(),
            password_hash: credential.password_hash.clone(),
        };
        self.pending.push(PendingWrite::Credential(record.clone()));
        Ok(record)
    }

    async fn update_password(
        &mut self,
        user_id: Uuid,
        salt: &str,
        password_hash: &str,
    ) -> Result<(), RecordError> {
        if self
            .find_credential(&CredentialLookup::Id(user_id))
            .await?
            .is_none()
        {
            return Err(RecordError::NotFound(user_id.to_string()));
        }
        self.pending.push(PendingWrite::Password {
            user_id,
            salt: salt.to_string(),
            password_hash: password_hash.to_string(),
        });
        Ok(())
    }

    async fn insert_login_event(&mut self, event: &LoginEvent) -> Result<(), RecordError> {
        self.pending.push(PendingWrite::LoginEvent(event.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RecordError> {
        let MemoryTransaction { state, pending } = *self;
        let mut state = state.lock().await;

        for write in &pending {
            if let PendingWrite::Credential(c) = write
                && state.taken(&c.username, &c.email)
            {
                return Err(RecordError::Conflict(
                    "username or email already registered".into(),
                ));
            }
        }

        for write in pending {
            match write {
                PendingWrite::Credential(c) => state.credentials.push(c),
                PendingWrite::Password {
                    user_id,
                    salt,
                    password_hash,
                } => {
                    if let Some(c) = state.credentials.iter_mut().find(|c| c.id == user_id) {
                        c.salt = salt;
                        c.password_hash = password_hash;
                    }
                }
                PendingWrite::LoginEvent(e) => state.login_events.push(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn new_credential(name: &str) -> NewCredential {
        NewCredential {
            username: name.into(),
            email: format!("{name}@example.com"),
            salt: "salt".into(),
            password_hash: "hash".into(),
        }
    }

    fn event(uid: Uuid) -> LoginEvent {
        LoginEvent {
            id: Uuid::now_v7(),
            uid,
            ip: "127.0.0.1".into(),
            location: String::new(),
            device: "Linux".into(),
            time: Utc::now(),
            application: "curl 8.0".into(),
            if_succeed: true,
            if_checked: false,
        }
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let store = MemoryRecordStore::new();
        let mut tx = store.begin().await.unwrap();
        let record = tx.insert_credential(&new_credential("alice")).await.unwrap();
        tx.insert_login_event(&event(record.id)).await.unwrap();
        tx.commit().await.unwrap();

        let found = store
            .credential(&CredentialLookup::Username("alice".into()))
            .await
            .unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(store.login_events().await.len(), 1);
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = MemoryRecordStore::new();
        let mut tx = store.begin().await.unwrap();
        let record = tx.insert_credential(&new_credential("bob")).await.unwrap();
        // Visible inside its own transaction.
        assert!(
            tx.find_credential(&CredentialLookup::Id(record.id))
                .await
                .unwrap()
                .is_some()
        );
        drop(tx);

        assert!(
            store
                .credential(&CredentialLookup::Id(record.id))
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn duplicates_conflict() {
        let store = MemoryRecordStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_credential(&new_credential("carol")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut dup = new_credential("carol2");
        dup.email = "carol@example.com".into();
        assert!(matches!(
            tx.insert_credential(&dup).await,
            Err(RecordError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn racing_registrations_conflict_on_commit() {
        let store = MemoryRecordStore::new();
        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();
        a.insert_credential(&new_credential("dave")).await.unwrap();
        b.insert_credential(&new_credential("dave")).await.unwrap();
        a.commit().await.unwrap();
        assert!(matches!(b.commit().await, Err(RecordError::Conflict(_))));
    }

    #[tokio::test]
    async fn password_update_applies_on_commit() {
        let store = MemoryRecordStore::new();
        let mut tx = store.begin().await.unwrap();
        let record = tx.insert_credential(&new_credential("erin")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.update_password(record.id, "salt2", "hash2").await.unwrap();
        tx.commit().await.unwrap();

        let found = store
            .credential(&CredentialLookup::Id(record.id))
            .await
            .unwrap();
        assert_eq!(found.salt, "salt2");
        assert_eq!(found.password_hash, "hash2");

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.update_password(Uuid::new_v4(), "s", "h").await,
            Err(RecordError::NotFound(_))
        ));
    }
}
