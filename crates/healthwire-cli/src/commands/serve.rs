use anyhow::Context;
use std::sync::Arc;

use healthwire_api::{create_router, AppState};
use healthwire_core::ServiceConfig;
use healthwire_storage::open_store;

pub async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let store = open_store(&config.storage).context("failed to open storage")?;
    let state = AppState::new(store, &config).context("failed to register metrics")?;
    let app = create_router(Arc::new(state));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(
        addr = %addr,
        backend = ?config.storage.backend,
        "Starting Healthwire server"
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
