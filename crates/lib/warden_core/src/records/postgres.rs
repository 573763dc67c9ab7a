//! PostgreSQL record store.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{RecordError, RecordStore, RecordTransaction};
use crate::models::auth::{CredentialLookup, CredentialRecord, LoginEvent, NewCredential};

type CredentialRow = (Uuid, String, String, String, String);

const FIND_BY_ID: &str =
    "SELECT id, username, email, salt, psw_hash FROM user_auth_info WHERE id = $1";
const FIND_BY_EMAIL: &str =
    "SELECT id, username, email, salt, psw_hash FROM user_auth_info WHERE email = $1";
const FIND_BY_USERNAME: &str =
    "SELECT id, username, email, salt, psw_hash FROM user_auth_info WHERE username = $1";

fn into_record((id, username, email, salt, password_hash): CredentialRow) -> CredentialRecord {
    CredentialRecord {
        id,
        username,
        email,
        salt,
        password_hash,
    }
}

fn map_unique_violation(e: sqlx::Error) -> RecordError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RecordError::Conflict("username or email already registered".into())
        }
        _ => RecordError::Database(e),
    }
}

/// Record store over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations under `warden_core/migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn begin(&self) -> Result<Box<dyn RecordTransaction>, RecordError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgRecordTransaction { tx }))
    }
}

/// Open PostgreSQL transaction. Rolled back by `sqlx` on drop.
pub struct PgRecordTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl RecordTransaction for PgRecordTransaction {
    async fn find_credential(
        &mut self,
        lookup: &CredentialLookup,
    ) -> Result<Option<CredentialRecord>, RecordError> {
        let query = match lookup {
            CredentialLookup::Id(_) => FIND_BY_ID,
            CredentialLookup::Email(_) => FIND_BY_EMAIL,
            CredentialLookup::Username(_) => FIND_BY_USERNAME,
        };
        let query = sqlx::query_as::<_, CredentialRow>(query);
        let query = match lookup {
            CredentialLookup::Id(id) => query.bind(*id),
            CredentialLookup::Email(email) => query.bind(email.clone()),
            CredentialLookup::Username(username) => query.bind(username.clone()),
        };
        let row = query.fetch_optional(&mut *self.tx).await?;
        Ok(row.map(into_record))
    }

    async fn credential_exists(&mut self, username: &str, email: &str) -> Result<bool, RecordError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_auth_info WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_credential(
        &mut self,
        credential: &NewCredential,
    ) -> Result<CredentialRecord, RecordError> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO user_auth_info (id, username, email, salt, psw_hash) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(&credential.username)
        .bind(&credential.email)
        .bind(&credential.salt)
        .bind(&credential.password_hash)
        .execute(&mut *self.tx)
        .await
        .map_err(map_unique_violation)?;

        Ok(CredentialRecord {
            id,
            username: credential.username.clone(),
            email: credential.email.clone(),
            salt: credential.salt.clone(),
            password_hash: credential.password_hash.clone(),
        })
    }

    async fn update_password(
        &mut self,
        user_id: Uuid,
        salt: &str,
        password_hash: &str,
    ) -> Result<(), RecordError> {
        let result = sqlx::query("UPDATE user_auth_info SET salt = $2, psw_hash = $3 WHERE id = $1")
            .bind(user_id)
            .bind(salt)
            .bind(password_hash)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RecordError::NotFound(user_id.to_string()));
        }
        Ok(())
    }

    async fn insert_login_event(&mut self, event: &LoginEvent) -> Result<(), RecordError> {
        sqlx::query(
            "INSERT INTO user_login_logs \
             (id, uid, ip, location, device, time, application, if_succeed, if_checked) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(event.id)
        .bind(event.uid)
        .bind(&event.ip)
        .bind(&event.location)
        .bind(&event.device)
        .bind(event.time)
        .bind(&event.application)
        .bind(event.if_succeed)
        .bind(event.if_checked)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RecordError> {
        self.tx.commit().await?;
        Ok(())
    }
}
