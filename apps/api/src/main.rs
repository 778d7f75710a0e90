mod analysis;
mod auth;
mod config;
mod errors;
mod llm_client;
mod models;
mod rasterize;
mod reviews;
mod routes;
mod state;
mod stores;

use anyhow::{Context, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::LlmAnalysisService;
use crate::config::{Config, RemoteConfig, StorageBackend};
use crate::llm_client::LlmClient;
use crate::rasterize::PdftoppmRasterizer;
use crate::reviews::{ReviewService, ReviewStores};
use crate::routes::build_router;
use crate::state::AppState;
use crate::stores::{BlobStore, KvStore, MemoryBlobStore, MemoryKvStore, RedisKvStore, S3BlobStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={},tower_http={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log,
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Analyxa API v{}", env!("CARGO_PKG_VERSION"));

    let (blobs, kv) = build_stores(&config).await?;

    // Initialize LLM client; one attempt never outlives the whole analysis budget
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config
            .anthropic_api_url
            .clone()
            .unwrap_or_else(|| llm_client::DEFAULT_API_URL.to_string()),
        config.analysis_timeout,
    )
    .context("failed to build LLM HTTP client")?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let stores = ReviewStores {
        analyzer: Arc::new(LlmAnalysisService::new(llm, blobs.clone())),
        rasterizer: Arc::new(PdftoppmRasterizer::new(config.rasterizer_bin.clone())),
        blobs,
        kv,
    };
    info!("Rasterizer: {}", config.rasterizer_bin);

    let reviews = Arc::new(ReviewService::new(stores, config.ingest_timeouts()));
    let state = AppState {
        reviews: reviews.clone(),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reviews.shutdown().await;
    info!("Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn build_stores(config: &Config) -> Result<(Arc<dyn BlobStore>, Arc<dyn KvStore>)> {
    match (config.storage, &config.remote) {
        (StorageBackend::Remote, Some(remote)) => {
            let redis = redis::Client::open(remote.redis_url.clone())
                .context("invalid REDIS_URL")?;
            info!("Redis client initialized");

            let s3 = build_s3_client(remote).await;
            info!("S3 client initialized (bucket: {})", remote.s3_bucket);

            Ok((
                Arc::new(S3BlobStore::new(s3, remote.s3_bucket.clone())),
                Arc::new(RedisKvStore::new(redis)),
            ))
        }
        (StorageBackend::Remote, None) => {
            anyhow::bail!("remote storage selected without connection settings")
        }
        (StorageBackend::Memory, _) => {
            info!("Using in-memory stores; nothing will survive a restart");
            Ok((
                Arc::new(MemoryBlobStore::new()),
                Arc::new(MemoryKvStore::new()),
            ))
        }
    }
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(remote: &RemoteConfig) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &remote.aws_access_key_id,
        &remote.aws_secret_access_key,
        None,
        None,
        "analyxa-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&remote.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
