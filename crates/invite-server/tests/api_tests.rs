//! Integration tests for the invite server API.

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use invite_server::{
    api::{create_router_with_rate_limit, AppState, RateLimitState},
    registry::{Registry, Store, TokenRecord},
};
use serde_json::{json, Value};
use tower::ServiceExt;

const PRESENT: &str = "11111111-1111-1111-1111-111111111111";
const ABSENT: &str = "22222222-2222-2222-2222-222222222222";

/// Create a test app state with memory-only storage and one issued token.
fn create_test_state() -> AppState {
    let mut registry = Registry::new();
    registry
        .insert_token(TokenRecord::new(PRESENT, None))
        .unwrap();
    AppState::new(registry, Store::memory())
}

fn create_test_app(state: AppState) -> Router {
    create_router_with_rate_limit(state, RateLimitState::permissive())
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn verify_request(token: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/api/token/verify?token={}", token))
        .body(Body::empty())
        .unwrap()
}

fn create_account_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/accounts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app(create_test_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["token_count"], 1);
    assert_eq!(json["account_count"], 0);
}

#[tokio::test]
async fn test_verify_present_token() {
    let app = create_test_app(create_test_state());

    let response = app.oneshot(verify_request(PRESENT)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "valid": true }));
}

#[tokio::test]
async fn test_verify_absent_token() {
    let app = create_test_app(create_test_state());

    let response = app.oneshot(verify_request(ABSENT)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "valid": false }));
}

#[tokio::test]
async fn test_verify_accepts_any_string() {
    let app = create_test_app(create_test_state());

    let response = app.oneshot(verify_request("not-a-uuid")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "valid": false }));
}

#[tokio::test]
async fn test_verify_is_idempotent() {
    let app = create_test_app(create_test_state());

    let first = app.clone().oneshot(verify_request(PRESENT)).await.unwrap();
    let second = app.oneshot(verify_request(PRESENT)).await.unwrap();

    assert_eq!(body_json(first).await, body_json(second).await);
}

#[tokio::test]
async fn test_verify_json_body() {
    let app = create_test_app(create_test_state());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/token/verify")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "token": PRESENT }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "valid": true }));
}

#[tokio::test]
async fn test_verify_without_token_parameter() {
    let app = create_test_app(create_test_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/token/verify")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_verify_json_body_without_token() {
    let app = create_test_app(create_test_state());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/token/verify")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_create_account_consumes_token() {
    let state = create_test_state();
    let app = create_test_app(state.clone());

    let response = app
        .clone()
        .oneshot(create_account_request(json!({
            "username": "nimoer",
            "password": "abc123",
            "token": PRESENT,
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["username"], "nimoer");
    assert!(json["created_at"].is_string());

    // The token is single-use
    let response = app.oneshot(verify_request(PRESENT)).await.unwrap();
    assert_eq!(body_json(response).await, json!({ "valid": false }));

    let registry = state.registry.read().await;
    let account = registry.get_account("nimoer").unwrap();
    assert_eq!(account.token, PRESENT);
    assert_ne!(account.password_hash, "abc123");
    let hash = PasswordHash::new(&account.password_hash).unwrap();
    assert!(Argon2::default()
        .verify_password(b"abc123", &hash)
        .is_ok());
}

#[tokio::test]
async fn test_create_account_reused_token() {
    let app = create_test_app(create_test_state());

    let first = app
        .clone()
        .oneshot(create_account_request(json!({
            "username": "nimoer",
            "password": "abc123",
            "token": PRESENT,
        })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(create_account_request(json!({
            "username": "someone-else",
            "password": "abc123",
            "token": PRESENT,
        })))
        .await
        .unwrap();

    assert_eq!(second.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(second).await["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_create_account_unknown_token() {
    let app = create_test_app(create_test_state());

    let response = app
        .oneshot(create_account_request(json!({
            "username": "nimoer",
            "password": "abc123",
            "token": ABSENT,
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_create_account_username_taken() {
    let state = create_test_state();
    state
        .registry
        .write()
        .await
        .insert_token(TokenRecord::new(ABSENT, None))
        .unwrap();
    let app = create_test_app(state.clone());

    let first = app
        .clone()
        .oneshot(create_account_request(json!({
            "username": "nimoer",
            "password": "abc123",
            "token": PRESENT,
        })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(create_account_request(json!({
            "username": "  nimoer  ",
            "password": "other",
            "token": ABSENT,
        })))
        .await
        .unwrap();

    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["code"], "USERNAME_TAKEN");

    // The rejected request did not consume its token
    assert!(state.registry.read().await.contains_token(ABSENT));
}

#[tokio::test]
async fn test_create_account_invalid_input() {
    let app = create_test_app(create_test_state());

    for body in [
        json!({ "username": "", "password": "abc123", "token": PRESENT }),
        json!({ "username": "nimo er", "password": "abc123", "token": PRESENT }),
        json!({ "username": "nimoer", "password": "", "token": PRESENT }),
    ] {
        let response = app
            .clone()
            .oneshot(create_account_request(body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "INVALID_REQUEST");
    }
}

#[tokio::test]
async fn test_create_account_missing_field() {
    let state = create_test_state();
    let app = create_test_app(state.clone());

    let response = app
        .oneshot(create_account_request(
            json!({ "username": "nimoer", "token": PRESENT }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_REQUEST");
    assert!(json["error"].as_str().unwrap().contains("password"));
    assert!(state.registry.read().await.contains_token(PRESENT));
}

#[tokio::test]
async fn test_create_account_wrong_content_type() {
    let app = create_test_app(create_test_state());

    let body = json!({ "username": "nimoer", "password": "abc123", "token": PRESENT });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/accounts")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_create_account_persists_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invites.json");

    let mut registry = Registry::new();
    registry
        .insert_token(TokenRecord::new(PRESENT, None))
        .unwrap();
    let app = create_test_app(AppState::new(registry, Store::file(path.clone())));

    let response = app
        .oneshot(create_account_request(json!({
            "username": "nimoer",
            "password": "abc123",
            "token": PRESENT,
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let reloaded = Store::file(path).load().await.unwrap();
    assert!(!reloaded.contains_token(PRESENT));
    assert!(reloaded.get_account("nimoer").is_some());
}

#[tokio::test]
async fn test_create_account_rolls_back_when_persist_fails() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the snapshot directory should be
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();

    let mut registry = Registry::new();
    registry
        .insert_token(TokenRecord::new(PRESENT, None))
        .unwrap();
    let state = AppState::new(registry, Store::file(blocker.join("invites.json")));
    let app = create_test_app(state.clone());

    let response = app
        .oneshot(create_account_request(json!({
            "username": "nimoer",
            "password": "abc123",
            "token": PRESENT,
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["code"], "STORAGE_ERROR");

    let registry = state.registry.read().await;
    assert!(registry.contains_token(PRESENT));
    assert!(registry.get_account("nimoer").is_none());
}

#[tokio::test]
async fn test_rate_limiting() {
    // Very restrictive rate limit: 1 request per minute
    let app = create_router_with_rate_limit(create_test_state(), RateLimitState::new(1));

    let response = app.clone().oneshot(verify_request(PRESENT)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(verify_request(PRESENT)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["code"], "RATE_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn test_unknown_route() {
    let app = create_test_app(create_test_state());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/unknown")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
