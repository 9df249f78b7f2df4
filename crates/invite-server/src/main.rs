//! Invite Server - Entry point.

use invite_server::{
    api::{create_router_with_rate_limit, AppState, RateLimitState},
    config::{Config, LogFormat},
    registry::Store,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    match config.log.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    info!("Starting Invite Server");

    // Initialize storage
    let store = if config.store.persist {
        Store::file(config.store.path.clone())
    } else {
        info!("Persistence disabled, using in-memory storage");
        Store::memory()
    };

    // Load existing registry; a corrupt snapshot must not be overwritten
    let mut registry = match store.load().await {
        Ok(r) => {
            info!(
                "Loaded registry with {} tokens and {} accounts",
                r.token_count(),
                r.account_count()
            );
            r
        }
        Err(e) => {
            error!("Failed to load registry: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(seed_path) = &config.store.seed_path {
        match Store::import_seed(&mut registry, seed_path).await {
            Ok(0) => info!("Seed file added no new tokens"),
            Ok(_) => {
                if let Err(e) = store.save(&registry).await {
                    error!("Failed to persist seeded tokens: {}", e);
                    std::process::exit(1);
                }
            }
            Err(e) => warn!("Failed to import seed file {:?}: {}", seed_path, e),
        }
    }

    if registry.token_count() == 0 {
        warn!("No invitation tokens loaded; every verification will fail");
    }

    // Create application state
    let state = AppState::new(registry, store);

    // Create router with rate limiting
    let rate_limit = RateLimitState::new(config.rate_limit.global_per_minute);
    let app = create_router_with_rate_limit(state, rate_limit);

    // Bind to address
    let addr = SocketAddr::new(
        config
            .server
            .listen_addr
            .parse()
            .unwrap_or([0, 0, 0, 0].into()),
        config.server.port,
    );

    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Run server
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Server stopped");
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
