//! Invite HTTP client.

use crate::error::ClientError;
use crate::gate::RegistrationApi;
use crate::types::*;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Invite server HTTP client.
#[derive(Clone)]
pub struct InviteClient {
    client: Client,
    base_url: String,
}

impl InviteClient {
    /// Create a new invite client.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a new invite client with a custom request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| ClientError::InvalidBaseUrl(e.to_string()))?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, base_url })
    }

    /// Get the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the invite server is healthy.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Ask the server whether `token` exists.
    #[instrument(skip_all)]
    pub async fn verify_token(&self, token: &str) -> Result<bool, ClientError> {
        let response = self
            .client
            .get(format!("{}/api/token/verify", self.base_url))
            .query(&[("token", token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let verification: VerifyTokenResponse = response.json().await?;
        debug!(valid = verification.valid, "Token verification answered");
        Ok(verification.valid)
    }

    /// Create an account, consuming the request's token.
    #[instrument(skip_all, fields(username = %request.username))]
    pub async fn create_account(
        &self,
        request: &RegistrationRequest,
    ) -> Result<AccountCreated, ClientError> {
        let body = CreateAccountBody {
            username: &request.username,
            password: request.password.expose_secret(),
            token: &request.token,
        };

        let response = self
            .client
            .post(format!("{}/api/accounts", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = error_from_response(response).await;
            warn!("Account creation failed: {}", error);
            return Err(error);
        }

        let account: AccountCreated = response.json().await?;
        debug!("Account created");
        Ok(account)
    }
}

#[async_trait]
impl RegistrationApi for InviteClient {
    async fn verify_token(&self, token: &str) -> Result<bool, ClientError> {
        InviteClient::verify_token(self, token).await
    }

    async fn create_account(
        &self,
        request: &RegistrationRequest,
    ) -> Result<AccountCreated, ClientError> {
        InviteClient::create_account(self, request).await
    }
}

/// Map a non-success response to a typed error using the server's `code`.
async fn error_from_response(response: Response) -> ClientError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(body) => match body.code.as_str() {
            "INVALID_TOKEN" => ClientError::InvalidToken,
            "USERNAME_TAKEN" => ClientError::UsernameTaken,
            "INVALID_REQUEST" => ClientError::Rejected(body.error),
            "RATE_LIMIT_EXCEEDED" => ClientError::RateLimited,
            _ => ClientError::Api {
                status: status.as_u16(),
                message: body.error,
            },
        },
        Err(_) if status == StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimited,
        Err(_) => ClientError::Api {
            status: status.as_u16(),
            message: text,
        },
    }
}
