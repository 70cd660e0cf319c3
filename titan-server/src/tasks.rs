//! Built-in background task handlers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use titan_blob::BlobStore;
use titan_cache::TitanCache;
use titan_core::{EntityKind, TenantContext};
use titan_events::{EventBus, EventEnvelope, EventType};
use titan_queue::{Job, TaskHandler};
use titan_repo::{DocumentStore, ListFilter};

pub const CLEANUP_ORPHANED_BLOBS: &str = "cleanup_orphaned_blobs";
pub const CACHE_WARMUP: &str = "cache_warmup";
pub const EVENT_REPLAY: &str = "event_replay";

fn tenant_of(job: &Job) -> TenantContext {
    TenantContext::new(job.tenant_id.clone())
}

/// Deletes blob rows whose hosting submodel no longer exists.
pub struct CleanupOrphanedBlobs {
    pub store: Arc<dyn DocumentStore>,
    pub blob_store: Arc<dyn BlobStore>,
}

#[async_trait]
impl TaskHandler for CleanupOrphanedBlobs {
    async fn handle(&self, job: Job) -> Result<Option<Value>, String> {
        let ctx = tenant_of(&job);
        let rows = self
            .store
            .all_blob_rows(&ctx)
            .await
            .map_err(|e| e.to_string())?;

        let mut removed = 0usize;
        for row in rows {
            let submodel = self
                .store
                .get(EntityKind::Submodel, &ctx, &row.submodel_id)
                .await
                .map_err(|e| e.to_string())?;
            if submodel.is_none() {
                let _ = self.blob_store.delete(&row).await;
                self.store
                    .delete_blob_row(&ctx, &row.id.to_string())
                    .await
                    .map_err(|e| e.to_string())?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "cleaned up orphaned blobs");
        }
        Ok(Some(json!({"removed": removed})))
    }
}

/// Re-primes entity cache pairs from the repository.
///
/// Runs as a leader-elected singleton, so the direct cache writes cannot
/// race the Single Writer on another instance.
pub struct CacheWarmup {
    pub store: Arc<dyn DocumentStore>,
    pub cache: Arc<dyn TitanCache>,
}

#[async_trait]
impl TaskHandler for CacheWarmup {
    async fn handle(&self, job: Job) -> Result<Option<Value>, String> {
        let ctx = tenant_of(&job);
        let mut warmed = 0usize;
        for kind in [
            EntityKind::Aas,
            EntityKind::Submodel,
            EntityKind::ConceptDescription,
        ] {
            let page = self
                .store
                .list(kind, &ctx, None, 1000, &ListFilter::default())
                .await
                .map_err(|e| e.to_string())?;
            for row in page.rows {
                if self
                    .cache
                    .set_pair(kind, &row.id_b64, &row.doc_bytes, &row.etag)
                    .await
                    .is_ok()
                {
                    warmed += 1;
                }
            }
        }
        info!(warmed, "cache warmup finished");
        Ok(Some(json!({"warmed": warmed})))
    }
}

/// Re-broadcasts an entity's current state through the event pipeline.
pub struct EventReplay {
    pub store: Arc<dyn DocumentStore>,
    pub bus: Arc<dyn EventBus>,
}

#[async_trait]
impl TaskHandler for EventReplay {
    async fn handle(&self, job: Job) -> Result<Option<Value>, String> {
        let ctx = tenant_of(&job);
        let entity = job
            .payload
            .get("entity")
            .and_then(Value::as_str)
            .and_then(EntityKind::parse)
            .ok_or_else(|| "payload requires an 'entity' kind".to_string())?;
        let identifier = job
            .payload
            .get("identifier")
            .and_then(Value::as_str)
            .ok_or_else(|| "payload requires an 'identifier'".to_string())?;

        let row = self
            .store
            .get(entity, &ctx, identifier)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("{} '{identifier}' not found", entity.as_str()))?;

        let event = EventEnvelope::new(entity, EventType::Updated, identifier)
            .with_doc(row.doc_bytes, row.etag);
        self.bus.publish(event).await.map_err(|e| e.to_string())?;
        Ok(None)
    }
}
