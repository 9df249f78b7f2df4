//! HTTP API for the invite server.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{cors_layer, logging_middleware, rate_limit_middleware, RateLimitState};
pub use types::*;

use crate::registry::{Registry, Store};
use axum::{
    body::Body,
    http::Request,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Token and account registry
    pub registry: Arc<RwLock<Registry>>,
    /// Persistent storage backend
    pub store: Arc<Store>,
}

impl AppState {
    /// Create new application state.
    pub fn new(registry: Registry, store: Store) -> Self {
        Self {
            registry: Arc::new(RwLock::new(registry)),
            store: Arc::new(store),
        }
    }
}

/// Create the API router.
pub fn create_router_with_rate_limit(state: AppState, rate_limit: RateLimitState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/token/verify",
            get(handlers::verify_token_query).post(handlers::verify_token_json),
        )
        .route("/api/accounts", post(handlers::create_account))
        .layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(cors_layer())
        // span carries the path only, query strings may hold tokens
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
        .with_state(state)
}
