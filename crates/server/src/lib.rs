//! HTTP API server for toolgate.
//!
//! This crate provides the axum router and startup path that:
//! - exposes tool detection, command validation, and execution endpoints
//! - owns the composition root (detection cache + execution service)
//! - adds request logging and body-size limiting middleware

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use toolgate_core::{
    DetectionCache, ExecutionLimits, ExecutionService, SystemProbe, ToolProbe,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

pub mod config;
pub mod handlers;
pub mod middleware;

pub use config::{load_config_from_env, ServerConfig};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<DetectionCache>,
    pub service: Arc<ExecutionService>,
    pub started_at: Instant,
}

impl AppState {
    /// Build the composition root from configuration and a probe.
    pub fn new(probe: Arc<dyn ToolProbe>, config: &ServerConfig) -> Self {
        let cache = Arc::new(DetectionCache::new(
            probe,
            Duration::from_secs(config.cache_ttl_secs),
        ));
        let service = Arc::new(ExecutionService::with_limits(
            cache.clone(),
            ExecutionLimits {
                default_timeout_secs: config.default_timeout_secs,
                max_timeout_secs: config.max_timeout_secs,
            },
        ));
        Self {
            cache,
            service,
            started_at: Instant::now(),
        }
    }
}

/// Build the API router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/tools", get(handlers::list_tools))
        .route("/detect", post(handlers::detect))
        .route("/tools/:tool/version", get(handlers::tool_version))
        .route("/execute", post(handlers::execute))
        .route("/validate-command", post(handlers::validate_command))
        .route("/status", get(handlers::service_status))
        .route("/clear-cache", post(handlers::clear_cache))
        .route("/cancel-executions", post(handlers::cancel_executions))
        .route("/history", get(handlers::history))
        .route("/supported-tools", get(handlers::supported_tools))
        .with_state(state)
}

/// Start the server and serve until shutdown.
pub async fn run() -> Result<()> {
    let config = load_config_from_env();
    info!("Configuration loaded: {:?}", config);

    let state = AppState::new(Arc::new(SystemProbe::new()), &config);

    let app = build_router(state)
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(
            ServiceBuilder::new()
                .layer(RequestBodyLimitLayer::new(config.max_body_size))
                .into_inner(),
        );

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!("toolgate listening on {}", config.bind);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
