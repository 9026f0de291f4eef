use anyhow::Context;
use tracing::info;

use clinicos_api::app::{AppState, build_app};
use clinicos_infra::{AuthzConfig, bootstrap};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AuthzConfig::from_env().context("reading configuration")?;
    clinicos_observability::init(config.log_format);

    let runtime = bootstrap(&config).await?;
    let app = build_app(AppState::from_runtime(&runtime));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    runtime.shutdown().await;
    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
