//! Titan-AAS server.
//!
//! Wires settings into backends, starts the Single Writer, the singleton
//! worker/scheduler under a leader lease, and serves the IDTA HTTP
//! surface until SIGTERM/SIGINT, then drains in reverse order.

mod tasks;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use titan_api::auth::{AnonymousAccess, RequireBearer, TokenVerifier};
use titan_api::{build_router, AppState};
use titan_blob::{BlobConfig, BlobStore, LocalBlobStore, S3CompatibleStore};
use titan_cache::{CacheTtl, MemoryCache, TitanCache};
use titan_core::{BlobStorageKind, Settings};
use titan_events::{EventBus, LogBroadcaster, MemoryEventBus, SingleWriter};
use titan_queue::{
    JobQueue, JobWorker, LeaderElection, MemoryLeaseStore, SchedulePreset, ScheduledJob,
    Scheduler, WorkerConfig,
};
use titan_repo::MemoryDocumentStore;

use tasks::{CacheWarmup, CleanupOrphanedBlobs, EventReplay};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();
    info!(instance_id = %settings.instance_id, "starting {}", settings.app_name);

    // ---- establish process-wide state ----

    let store = Arc::new(MemoryDocumentStore::new());
    let cache: Arc<dyn TitanCache> = Arc::new(MemoryCache::new(CacheTtl {
        entity: Duration::from_secs(settings.cache_entity_ttl_secs),
        element_value: Duration::from_secs(settings.cache_value_ttl_secs),
    }));
    let bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::new(settings.event_bus_capacity));
    let queue = Arc::new(JobQueue::new());

    let blob_config = BlobConfig::default()
        .with_inline_threshold(settings.blob_inline_threshold)
        .with_chunk_size(settings.blob_chunk_size);
    let blob_store: Arc<dyn BlobStore> = match settings.blob_storage_type {
        BlobStorageKind::Local => Arc::new(LocalBlobStore::new(
            settings.blob_storage_path.clone(),
            blob_config,
        )),
        BlobStorageKind::S3 => {
            let bucket = settings
                .s3_bucket
                .clone()
                .context("S3_BUCKET is required for the s3 blob backend")?;
            Arc::new(
                S3CompatibleStore::connect(
                    bucket,
                    settings.s3_prefix.clone(),
                    settings.s3_region.clone(),
                    settings.s3_endpoint_url.clone(),
                    blob_config,
                )
                .await,
            )
        }
    };

    let verifier: Arc<dyn TokenVerifier> = if settings.auth_enabled() {
        Arc::new(RequireBearer)
    } else {
        Arc::new(AnonymousAccess)
    };

    let bind_addr = format!("{}:{}", settings.host, settings.port);
    let instance_id = settings.instance_id.clone();
    let state = AppState::new(
        settings,
        store.clone(),
        cache.clone(),
        bus.clone(),
        blob_store.clone(),
        queue.clone(),
        verifier,
    );

    // ---- event pipeline ----

    let writer = SingleWriter::new(bus.clone(), cache.clone())
        .with_broadcaster(state.ws_hub.clone())
        .with_broadcaster(Arc::new(LogBroadcaster))
        .start();

    // ---- singleton background workloads ----

    let lease_store = Arc::new(MemoryLeaseStore::new());
    let election = LeaderElection::new(
        lease_store,
        "titan-singleton",
        instance_id.clone(),
        Duration::from_secs(30),
    );
    election.start();

    let worker = JobWorker::new(queue.clone(), WorkerConfig::default())
        .register_handler(
            tasks::CLEANUP_ORPHANED_BLOBS,
            Arc::new(CleanupOrphanedBlobs {
                store: store.clone(),
                blob_store: blob_store.clone(),
            }),
        )
        .register_handler(
            tasks::CACHE_WARMUP,
            Arc::new(CacheWarmup {
                store: store.clone(),
                cache: cache.clone(),
            }),
        )
        .register_handler(
            tasks::EVENT_REPLAY,
            Arc::new(EventReplay {
                store: store.clone(),
                bus: bus.clone(),
            }),
        )
        .with_leader_election(election.clone())
        .start();

    let scheduler = Scheduler::new(queue.clone(), titan_core::tenant::DEFAULT_TENANT)
        .add_job(ScheduledJob::preset(
            "hourly-blob-cleanup",
            tasks::CLEANUP_ORPHANED_BLOBS,
            SchedulePreset::Hourly,
            serde_json::json!({}),
        ))
        .with_leader_election(election.clone())
        .start();

    // ---- serve ----

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "listening");

    axum::serve(
        listener,
        build_router(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    // ---- drain and release ----

    info!("shutting down");
    scheduler.shutdown().await;
    worker.shutdown().await;
    election.stop().await;
    writer.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
