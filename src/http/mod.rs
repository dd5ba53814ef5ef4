//! HTTP server for the matching and backlog endpoints.
//!
//! Transport concerns only: routing, request/response shapes, and the
//! error-kind to status-code mapping. All behavior lives in the matcher and
//! backlog modules.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::catalog::CatalogRepo;
use crate::config::Config;
use crate::llm::LlmGateway;

/// Shared application state for HTTP handlers
pub struct AppState {
    pub config: Config,
    pub gateway: LlmGateway,
    pub catalog: CatalogRepo,
}

/// Run the HTTP server with the given configuration.
pub async fn run_server(config: Config) -> Result<()> {
    let gateway = LlmGateway::new(&config)?;
    let catalog = CatalogRepo::connect(&config.database_url).await?;

    let port = config.port;
    let state = Arc::new(AppState {
        config,
        gateway,
        catalog,
    });

    let app = handlers::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("marketmatch HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("HTTP server error")?;

    Ok(())
}
