//! HTTP handlers for Healthwire
//!
//! Routes:
//! - `POST /telemetry/ingest`: signed sample ingestion
//! - `GET /telemetry/health`: windowed health report for the calling client
//! - `GET /health`: liveness
//! - `GET /metrics`: Prometheus text exposition

pub mod middleware;
pub mod routes;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use healthwire_core::config::{ServerConfig, ServiceConfig};
use healthwire_storage::TelemetryStore;

use crate::metrics::ApiMetrics;
use crate::service::{HealthQueryService, IngestionPipeline};

/// Application state
#[derive(Debug)]
pub struct AppState {
    pub ingestion: IngestionPipeline,
    pub health: HealthQueryService,
    pub metrics: ApiMetrics,
    pub server: ServerConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn TelemetryStore>, config: &ServiceConfig) -> Result<Self, prometheus::Error> {
        Ok(Self {
            ingestion: IngestionPipeline::new(Arc::clone(&store)),
            health: HealthQueryService::new(store, Arc::new(config.rules)),
            metrics: ApiMetrics::new()?,
            server: config.server.clone(),
        })
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/telemetry/ingest", any(routes::ingest))
        .route(
            "/telemetry/health",
            get(routes::health_report).fallback(routes::get_only),
        )
        .route("/health", get(routes::liveness))
        .route("/metrics", get(routes::metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(middleware::request_logging_middleware))
                .layer(from_fn_with_state(
                    Arc::clone(&state),
                    middleware::timeout_middleware,
                )),
        )
        .with_state(state)
}
