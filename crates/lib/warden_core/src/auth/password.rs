//! Password hashing via bcrypt, salted with a per-account random string.
//!
//! bcrypt is CPU-bound; the `_blocking` variants run it on tokio's blocking
//! pool so request workers stay free.

use std::sync::LazyLock;

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;

/// bcrypt cost factor.
const BCRYPT_COST: u32 = 10;

/// Length of generated per-account salts.
pub const SALT_LENGTH: usize = 16;

/// Hash of a random password. Checked against when no account matched, so an
/// unknown account costs the same bcrypt work as a wrong password.
static DECOY_HASH: LazyLock<String> =
    LazyLock::new(|| hash_password(&generate_salt(), &generate_salt()).unwrap_or_default());

#[derive(Debug, Error)]
pub enum PasswordError {
    /// Password, salt or stored hash did not match. Deliberately vague.
    #[error("Credential mismatch")]
    CredentialMismatch,

    #[error("bcrypt hash: {0}")]
    HashingFailed(String),
}

/// Generate a random alphanumeric salt of [`SALT_LENGTH`] chars.
pub fn generate_salt() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LENGTH)
        .map(char::from)
        .collect()
}

fn salted(password: &str, salt: &str) -> String {
    let mut buf = String::with_capacity(password.len() + salt.len());
    buf.push_str(password);
    buf.push_str(salt);
    buf
}

/// Hash `password + salt` with bcrypt (cost 10).
pub fn hash_password(password: &str, salt: &str) -> Result<String, PasswordError> {
    bcrypt::hash(salted(password, salt), BCRYPT_COST)
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// Verify `password + salt` against a stored bcrypt hash.
///
/// A corrupt stored hash is reported as a mismatch as well, so callers can
/// never tell which of the three inputs was wrong.
pub fn verify_password(hash: &str, password: &str, salt: &str) -> Result<(), PasswordError> {
    match bcrypt::verify(salted(password, salt), hash) {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(PasswordError::CredentialMismatch),
    }
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: &str, salt: &str) -> Result<String, PasswordError> {
    let (password, salt) = (password.to_string(), salt.to_string());
    tokio::task::spawn_blocking(move || hash_password(&password, &salt))
        .await
        .map_err(|e| PasswordError::HashingFailed(format!("hash task: {e}")))?
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_blocking(
    hash: &str,
    password: &str,
    salt: &str,
) -> Result<(), PasswordError> {
    let (hash, password, salt) = (hash.to_string(), password.to_string(), salt.to_string());
    tokio::task::spawn_blocking(move || verify_password(&hash, &password, &salt))
        .await
        .map_err(|e| PasswordError::HashingFailed(format!("verify task: {e}")))?
}

/// Spend one verification's worth of bcrypt on a password that matched no
/// account. Always a mismatch.
pub async fn verify_decoy(password: &str) {
    let password = password.to_string();
    let _ = tokio::task::spawn_blocking(move || verify_password(&DECOY_HASH, &password, "")).await;
}
