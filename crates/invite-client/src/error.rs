//! Invite client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Token is not valid or has already been used")]
    InvalidToken,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Rate limited by server")]
    RateLimited,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl ClientError {
    /// Whether the request never produced an answer from the server.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Http(_))
    }
}
