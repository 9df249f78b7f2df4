//! Invitation token and account registry with optional file persistence.

mod memory;
mod store;

pub use memory::Registry;
pub use store::{parse_seed, FileStore, MemoryStore, Store};

use argon2::password_hash::{
    rand_core::OsRng, Error as PasswordHashError, PasswordHasher, SaltString,
};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest username accepted, in characters.
pub const MAX_USERNAME_LEN: usize = 64;

/// An invitation token that has been issued and not yet consumed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Opaque token value (a hyphenated UUID when issued by us)
    pub token: String,

    /// When the token was added to the store
    pub issued_at: DateTime<Utc>,

    /// Free text left by whoever issued the token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TokenRecord {
    /// Create a new token record issued now.
    pub fn new(token: impl Into<String>, note: Option<String>) -> Self {
        Self {
            token: token.into(),
            issued_at: Utc::now(),
            note,
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Normalized username
    pub username: String,

    /// Argon2 PHC string of the password
    pub password_hash: String,

    /// Invitation token consumed to create this account
    pub token: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl AccountRecord {
    /// Create a new account record created now.
    pub fn new(username: String, password_hash: String, token: String) -> Self {
        Self {
            username,
            password_hash,
            token,
            created_at: Utc::now(),
        }
    }
}

/// Hash a password with Argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Short SHA-256 fingerprint of a token, safe to put in logs.
pub fn token_fingerprint(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(12);
    digest
}

/// Normalize a username: trim surrounding whitespace and check its shape.
pub fn normalize_username(username: &str) -> Result<String, String> {
    let username = username.trim();

    if username.is_empty() {
        return Err("Username must not be empty".into());
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LEN
        ));
    }

    if username
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err("Username must not contain whitespace".into());
    }

    Ok(username.to_string())
}
