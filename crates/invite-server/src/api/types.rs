//! API request and response types.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Token verification input, from a query string or a JSON body.
#[derive(Debug, Deserialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

/// Token verification result.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyTokenResponse {
    pub valid: bool,
}

/// Request to create an account with an invitation token.
#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,

    /// Plain password; only its Argon2 hash is stored
    pub password: SecretString,

    /// Invitation token consumed by the registration
    pub token: String,
}

/// Response after creating an account.
#[derive(Debug, Serialize)]
pub struct AccountCreatedResponse {
    pub username: String,
    pub created_at: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub token_count: usize,
    pub account_count: usize,
}
