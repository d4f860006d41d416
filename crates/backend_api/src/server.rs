use anyhow::Context;
use std::net::SocketAddr;

use crate::{handlers::SharedState, router::create_router};

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "backend_api=debug,persistence=debug,tower_http=debug";

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();
}

/// Socket address for an IP literal host; IPv6 may be bracketed.
pub fn bind_address(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let host = host.trim().trim_start_matches('[').trim_end_matches(']');
    let ip = host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("HOST must be an IP address, got '{host}'"))?;
    Ok(SocketAddr::new(ip, port))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Serves the projection store until Ctrl-C; in-progress requests finish first.
pub async fn run_server(state: SharedState, host: &str, port: u16) -> anyhow::Result<()> {
    init_tracing();

    let addr = bind_address(host, port)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Projection store listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
