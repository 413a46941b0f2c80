//! HTTP query server.
//!
//! # Endpoints
//!
//! - `GET /health` - Health and loaded datasets
//! - `POST /load_dataset` / `POST /unload_dataset` - Dataset lifecycle
//! - `GET|POST /nearest_edges` - KNN candidate edges for a coordinate
//! - `GET|POST /route` - Coordinate-to-coordinate routing
//! - `POST /route_by_edge` - Edge-ID-to-edge-ID routing
//! - `GET /boundary` - Dataset boundary GeoJSON
//! - `GET /swagger-ui` - OpenAPI documentation
//!
//! The server is a thread-per-request adapter over the synchronous engine:
//! a query runs to completion on its worker, and dataset handles pin the
//! data a request reads so unloads never pull it out from under a search.

pub mod api;
pub mod geojson;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::ServerConfig;
use crate::registry::Registry;

pub use api::AppState;

/// Initialize structured logging with tracing.
///
/// - `log_format`: "text" for human-readable, "json" for structured JSON lines.
/// - Respects RUST_LOG env var for filtering (default: `info,tower_http=debug`).
pub fn init_tracing(log_format: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    match log_format {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(false).init();
        }
    }
}

/// Shutdown signal: waits for SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, starting graceful shutdown");
}

/// Preload configured datasets, then serve until shutdown.
pub async fn serve(config: ServerConfig) -> Result<()> {
    let registry = Registry::new();
    let index_kind = config.index_kind();

    for ds in &config.datasets {
        let loaded = match (&ds.db_path, &ds.shortcuts_path, &ds.edges_path) {
            (Some(db_path), _, _) => load_db(&registry, &ds.name, db_path, index_kind),
            (None, Some(shortcuts), Some(edges)) => registry
                .load_from_files(
                    &ds.name,
                    std::path::Path::new(shortcuts),
                    std::path::Path::new(edges),
                    index_kind,
                )
                .map_err(anyhow::Error::from),
            _ => {
                tracing::warn!(dataset = %ds.name, "dataset config needs db_path or shortcuts_path+edges_path");
                continue;
            }
        };
        if let Err(e) = loaded {
            tracing::error!(dataset = %ds.name, error = %e, "failed to preload dataset");
        }
    }

    let state = Arc::new(AppState {
        registry,
        index_kind,
    });
    let app = api::build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "server listening");
    tracing::info!("Swagger UI: http://{addr}/swagger-ui/");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[cfg(feature = "duckdb")]
fn load_db(
    registry: &Registry,
    name: &str,
    db_path: &str,
    index_kind: crate::spatial::IndexKind,
) -> Result<()> {
    registry
        .load_from_duckdb(name, std::path::Path::new(db_path), index_kind)
        .map_err(anyhow::Error::from)
}

#[cfg(not(feature = "duckdb"))]
fn load_db(
    _registry: &Registry,
    _name: &str,
    _db_path: &str,
    _index_kind: crate::spatial::IndexKind,
) -> Result<()> {
    anyhow::bail!("built without duckdb support; use shortcuts_path + edges_path")
}
