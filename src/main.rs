use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::settings::AppConfig;
use crate::infrastructure::db::pool::{connect_to_db, ensure_schema};
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::infrastructure::storage::s3::StorageService;
use crate::infrastructure::transcoder::bento4::Bento4Transcoder;
use crate::modules::encoding::job_service::JobService;
use crate::modules::encoding::repository::{EncodingRepository, JobStore};
use crate::state::AppState;

mod app;
mod common;
mod config;
mod error;
mod infrastructure;
mod modules;
mod routes;
mod state;
#[cfg(test)]
mod testing;
mod workers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting encoder...");

    let config = AppConfig::new().context("Missing required environment variable")?;
    tokio::fs::create_dir_all(&config.local_storage_path)
        .await
        .with_context(|| format!("Cannot create {}", config.local_storage_path.display()))?;

    // Each executor holds at most one connection at a time; keep a few for the API.
    let max_connections = u32::try_from(config.concurrency_workers + 4).unwrap_or(u32::MAX);
    let db = connect_to_db(&config.database_url, max_connections).await?;
    ensure_schema(&db).await?;

    let store: Arc<dyn JobStore> = Arc::new(EncodingRepository::new(db));
    let storage = Arc::new(
        StorageService::new(&config.minio_url, &config.minio_access_key, &config.minio_secret_key).await,
    );
    let transcoder = Arc::new(Bento4Transcoder::new(
        config.bento4_exec_dir.clone(),
        config.transcode_timeout(),
    ));
    let service = Arc::new(JobService::new(
        Arc::clone(&store),
        storage,
        transcoder,
        config.pipeline(),
    )
    .with_package_args(config.package_extra_args.clone()));

    let rabbit = RabbitMqService::new(&config.rabbitmq_url).await?;
    let encoder = tokio::spawn(workers::encoder::start_encoder_worker(
        rabbit,
        service,
        config.clone(),
    ));

    let app = app::create_app(AppState::new(store));

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    tokio::select! {
        served = axum::serve(listener, app).into_future() => served?,
        finished = encoder => finished??,
    }

    Ok(())
}
