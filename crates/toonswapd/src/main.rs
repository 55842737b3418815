use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod http;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config::Config::from_env();
    tracing::info!(
        bind = %config.bind_addr,
        model_dir = %config.model_dir.display(),
        preset = %config.default_preset,
        "toonswapd starting"
    );

    let engine = engine::spawn_engine(&config.model_dir, config.queue_depth)?;
    let state = http::AppState {
        engine,
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&state.config.bind_addr).await?;
    tracing::info!("toonswapd ready");

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("toonswapd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
