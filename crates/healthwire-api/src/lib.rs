//! Healthwire HTTP API
//!
//! The axum surface over the core pipeline:
//!
//! - **Services** (`service`): Signature Verifier, Ingestion Pipeline and
//!   Health Query Service, independent of HTTP framing
//! - **Handlers** (`handler`): routes, request-id logging, request deadline
//! - **Metrics** (`metrics`): Prometheus counters and histograms
//!
//! # Example
//!
//! ```rust,no_run
//! use healthwire_api::{create_router, AppState};
//! use healthwire_core::ServiceConfig;
//! use healthwire_storage::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ServiceConfig::default();
//! let state = AppState::new(Arc::new(MemoryStore::new()), &config)?;
//! let app = create_router(Arc::new(state));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8090").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handler;
pub mod metrics;
pub mod service;

pub use error::{ApiError, ErrorBody};
pub use handler::{create_router, AppState};
pub use metrics::ApiMetrics;
pub use service::{Credentials, HealthQueryService, IngestRequest, IngestionPipeline, SignatureVerifier};
