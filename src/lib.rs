use std::sync::Arc;
use std::time::Duration;

use snafu::ResultExt as _;
use tokio::net::TcpListener;

pub mod api;
pub mod config;
pub mod error;
pub mod logger;
pub mod model;
pub mod service;

use config::Config;
use error::{ApplicationError, BindAddressSnafu, BuildClientSnafu, WebServerSnafu};
use service::api::ApiClient;
use service::replicator::Replicator;

/// How long queued progress writes may take to drain on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(config: Config) -> Result<(), ApplicationError> {
    let client = ApiClient::new(&config.api).context(BuildClientSnafu)?;
    let (replicator, worker) = Replicator::spawn(
        Arc::new(client.clone()),
        config.progress.queue_capacity,
        config.progress.concurrency,
    );

    let app = api::create_app(&config, client, replicator);
    let router = api::create_router(app.clone(), &config.static_dir);

    let listener = TcpListener::bind(config.host).await.context(BindAddressSnafu {
        address: config.host,
    })?;
    tracing::info!(address = %config.host, api = %config.api.base_url, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context(WebServerSnafu)?;

    app.progress.close_all().await;
    drop(app);

    if tokio::time::timeout(DRAIN_TIMEOUT, worker).await.is_err() {
        tracing::warn!("gave up waiting for queued progress writes");
    }

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "could not listen for the shutdown signal");
        std::future::pending::<()>().await;
    }

    tracing::info!("shutdown signal received");
}
