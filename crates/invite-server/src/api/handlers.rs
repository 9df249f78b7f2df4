//! HTTP request handlers.

use super::types::{
    AccountCreatedResponse, CreateAccountRequest, HealthResponse, VerifyTokenRequest,
    VerifyTokenResponse,
};
use super::AppState;
use crate::error::ApiError;
use crate::registry::{hash_password, normalize_username, token_fingerprint, AccountRecord};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use secrecy::ExposeSecret;
use tracing::{debug, error, info, warn};

/// Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.registry.read().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        token_count: registry.token_count(),
        account_count: registry.account_count(),
    })
}

/// Verify a token passed as `?token=`.
pub async fn verify_token_query(
    State(state): State<AppState>,
    query: Result<Query<VerifyTokenRequest>, QueryRejection>,
) -> Result<Json<VerifyTokenResponse>, ApiError> {
    let Query(request) = query?;
    Ok(Json(verify(&state, &request.token).await))
}

/// Verify a token passed in a JSON body.
pub async fn verify_token_json(
    State(state): State<AppState>,
    body: Result<Json<VerifyTokenRequest>, JsonRejection>,
) -> Result<Json<VerifyTokenResponse>, ApiError> {
    let Json(request) = body?;
    Ok(Json(verify(&state, &request.token).await))
}

/// Report whether `token` exists in the store. Absence is not an error.
async fn verify(state: &AppState, token: &str) -> VerifyTokenResponse {
    let valid = state.registry.read().await.contains_token(token);
    debug!(token = %token_fingerprint(token), valid, "Token verified");
    VerifyTokenResponse { valid }
}

/// Create an account, consuming its invitation token.
pub async fn create_account(
    State(state): State<AppState>,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountCreatedResponse>), ApiError> {
    let Json(request) = body?;
    let username = normalize_username(&request.username).map_err(ApiError::InvalidRequest)?;
    if request.password.expose_secret().is_empty() {
        return Err(ApiError::InvalidRequest(
            "Password must not be empty".to_string(),
        ));
    }

    let fingerprint = token_fingerprint(&request.token);
    info!(%username, token = %fingerprint, "Account creation request received");

    // Reject early so a bad token never costs a password hash
    let registry = state.registry.read().await;
    if !registry.contains_token(&request.token) {
        warn!(%username, token = %fingerprint, "Account creation with unknown token");
        return Err(ApiError::InvalidToken);
    }
    if registry.get_account(&username).is_some() {
        return Err(ApiError::UsernameTaken(username));
    }
    drop(registry);

    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(password.expose_secret()))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))??;

    let account = AccountRecord::new(username.clone(), password_hash, request.token);
    let created_at = account.created_at;

    // Token and username are checked again under the write lock
    let mut registry = state.registry.write().await;
    let consumed = registry.register_account(account)?;

    if let Err(e) = state.store.save(&registry).await {
        error!(%username, error = %e, "Failed to persist new account, rolling back");
        registry.undo_registration(&username, consumed);
        return Err(e);
    }

    info!(%username, token = %fingerprint, "Account created");

    Ok((
        StatusCode::CREATED,
        Json(AccountCreatedResponse {
            username,
            created_at: created_at.to_rfc3339(),
        }),
    ))
}
