//! Invite API types.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Token verification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VerifyTokenResponse {
    pub valid: bool,
}

/// A validated registration, ready to submit.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub username: String,
    pub password: SecretString,
    pub token: String,
}

/// Account creation request body.
#[derive(Debug, Serialize)]
pub(crate) struct CreateAccountBody<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub token: &'a str,
}

/// Account created by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountCreated {
    pub username: String,
    pub created_at: String,
}

/// Error body returned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    pub code: String,
}
