mod config;
mod database;
mod error;
mod handlers;
mod models;
mod routes;
mod service;
mod state;
mod storage;
mod store;
mod utils;

#[cfg(test)]
mod test_utils;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    routes::router,
    service::FileService,
    state::AppState,
    storage::init_media_host,
    store::init_store,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let store = init_store(&config)
        .await
        .context("Failed to initialize record store")?;

    let host = init_media_host(&config)
        .await
        .context("Failed to initialize media host")?;

    let app_state = AppState {
        files: FileService::new(host, store, config.upload_folder.clone()),
        config: config.clone(),
    };

    let app = router(app_state);

    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
