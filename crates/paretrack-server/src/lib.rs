//! paretrack-server: Axum JSON API over experiment directories.
//!
//! Experiments live under `<base_dir>/<experiment>/<run>/metrics.parquet`.
//! Every endpoint loads events, reduces them to run vectors and, for frontier
//! requests, runs the Pareto analysis through the shared `FrontierCache`.

pub mod api;
pub mod state;

use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::state::AppState;

pub use api::FrontierReport;
pub use state::ServerConfig;

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api::router())
        .with_state(state)
        .layer(cors)
}

/// Start the server on the given address.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::new(&config);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        base_dir = %config.base_dir.display(),
        cache_capacity = config.cache_capacity,
        "paretrack API at http://{}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
