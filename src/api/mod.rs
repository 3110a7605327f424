pub mod routes;

use crate::config::Config;
use anyhow::{Context, Result};
use axum::Router;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn app(config: Arc<Config>, config_path: PathBuf) -> Router {
    routes::router(routes::ApiState {
        config,
        config_path,
    })
    .layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: Arc<Config>, config_path: PathBuf) -> Result<()> {
    let port = config.api_port;
    let app = app(config, config_path);

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, "WorkTrace API server started");

    axum::serve(listener, app)
        .await
        .context("API server failed")?;

    Ok(())
}
