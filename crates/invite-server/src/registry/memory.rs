//! In-memory registry implementation.

use super::{AccountRecord, TokenRecord};
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// In-memory token and account registry.
///
/// Tokens are keyed by value, so a token can only be stored once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    /// Unconsumed tokens indexed by token value
    #[serde(default)]
    tokens: HashMap<String, TokenRecord>,

    /// Accounts indexed by normalized username
    #[serde(default)]
    accounts: HashMap<String, AccountRecord>,
}

impl Registry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
            accounts: HashMap::new(),
        }
    }

    /// Check whether a token exists.
    pub fn contains_token(&self, token: &str) -> bool {
        self.tokens.contains_key(token)
    }

    /// Get a token record by value.
    pub fn get_token(&self, token: &str) -> Option<&TokenRecord> {
        self.tokens.get(token)
    }

    /// Insert a new token. Fails if the value is already present.
    pub fn insert_token(&mut self, record: TokenRecord) -> Result<(), ApiError> {
        if self.tokens.contains_key(&record.token) {
            return Err(ApiError::DuplicateToken);
        }
        self.tokens.insert(record.token.clone(), record);
        Ok(())
    }

    /// Remove a token, returning its record.
    pub fn take_token(&mut self, token: &str) -> Option<TokenRecord> {
        self.tokens.remove(token)
    }

    /// Import token values, skipping ones already present.
    ///
    /// Returns the number of tokens actually added.
    pub fn import_tokens<I, S>(&mut self, tokens: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for token in tokens {
            if self.insert_token(TokenRecord::new(token, None)).is_ok() {
                added += 1;
            }
        }
        added
    }

    /// Get an account by username.
    pub fn get_account(&self, username: &str) -> Option<&AccountRecord> {
        self.accounts.get(username)
    }

    /// Insert or replace an account.
    pub fn insert_account(&mut self, record: AccountRecord) {
        self.accounts.insert(record.username.clone(), record);
    }

    /// Remove an account.
    pub fn remove_account(&mut self, username: &str) -> Option<AccountRecord> {
        self.accounts.remove(username)
    }

    /// Create an account by consuming its invitation token.
    ///
    /// The token must exist and the username must be free; on success the
    /// token is removed and its record returned so the caller can undo the
    /// change with [`Registry::undo_registration`].
    pub fn register_account(&mut self, account: AccountRecord) -> Result<TokenRecord, ApiError> {
        if !self.tokens.contains_key(&account.token) {
            return Err(ApiError::InvalidToken);
        }
        if self.accounts.contains_key(&account.username) {
            return Err(ApiError::UsernameTaken(account.username));
        }

        let consumed = self
            .tokens
            .remove(&account.token)
            .ok_or(ApiError::InvalidToken)?;
        self.insert_account(account);
        Ok(consumed)
    }

    /// Reverse a successful [`Registry::register_account`].
    pub fn undo_registration(&mut self, username: &str, consumed: TokenRecord) {
        self.accounts.remove(username);
        self.tokens.insert(consumed.token.clone(), consumed);
    }

    /// Number of unconsumed tokens.
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Number of registered accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}
