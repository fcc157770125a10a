use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use apstra_assistant::{AssistantService, Config, http};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();

    let service = Arc::new(AssistantService::new(&config).context("failed to start assistant")?);

    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid server.bind '{}' (expected host:port)", config.server.bind))?;
    let router = http::router(service, config.server.access_password.as_deref());

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(
        %bind,
        name = %config.server.name,
        version = %config.server.version,
        auth = %config.server.access_password.as_deref().map(|_| "bearer").unwrap_or("none"),
        "Starting assistant backend"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;
    Ok(())
}
