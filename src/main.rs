//! Reviewer Roster Backend
//!
//! Assigns reviewers to pull requests and re-balances open reviews when a
//! whole team is taken offline. SQLite persistence, axum REST surface.

mod api;
mod assignment;
mod config;
mod db;
mod errors;
mod models;
mod service;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat, StorageBackend};
use db::{InMemoryStore, Repository, ReviewStore};
use service::ReviewService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReviewService>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    tracing::info!("Starting Reviewer Roster Backend");
    tracing::info!("Storage backend: {:?}", config.storage);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        "Operation timeout: {:?}, revalidate before write: {}",
        config.operation_timeout,
        config.revalidate_before_write
    );

    let store: Arc<dyn ReviewStore> = match config.storage {
        StorageBackend::Sqlite => {
            tracing::info!("Database path: {:?}", config.db_path);
            let pool = db::init_database(&config.db_path).await?;
            Arc::new(Repository::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage. All data is lost on restart!");
            Arc::new(InMemoryStore::new())
        }
    };

    if config.rng_seed.is_some() {
        tracing::warn!("Reviewer selection uses a fixed seed (ROSTER_RNG_SEED)");
    }

    let state = AppState {
        service: Arc::new(ReviewService::new(store, &config)),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Teams
        .route("/team/add", post(api::add_team))
        .route("/team/get", get(api::get_team))
        .route("/team/deactivate", post(api::deactivate_team))
        // Users
        .route("/users/setIsActive", post(api::set_is_active))
        .route("/users/getReview", get(api::get_review))
        // Pull requests
        .route("/pullRequest/create", post(api::create_pull_request))
        .route("/pullRequest/merge", post(api::merge_pull_request))
        .route("/pullRequest/reassign", post(api::reassign_reviewer))
        // Stats
        .route("/stats/reviewers", get(api::reviewer_stats));

    Router::new()
        .merge(api_routes)
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests;
