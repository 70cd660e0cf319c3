//! Submodel repository.
//!
//! Submodels carry the blob lifecycle: on write the document is walked by
//! the externalizer, new blob rows persist in the same commit as the
//! entity row, and rows orphaned by a replace or delete cascade out of
//! both the store and the backend.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use titan_blob::{externalize_submodel_doc, BlobMetadata, BlobStore};
use titan_core::{EntityKind, TenantContext, TitanError, TitanResult};
use titan_events::{EventBus, EventEnvelope, EventType};
use titan_model::{validation, Submodel};
use titan_projection::merge_patch;

use crate::repo::{EntityPage, IfMatch, RepoCore};
use crate::store::{DocumentStore, EntityRow, ListFilter};

#[derive(Clone)]
pub struct SubmodelRepository {
    pub(crate) core: RepoCore,
    pub(crate) blob_store: Arc<dyn BlobStore>,
}

impl SubmodelRepository {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        bus: Arc<dyn EventBus>,
        blob_store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            core: RepoCore::new(store, bus, EntityKind::Submodel),
            blob_store,
        }
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blob_store
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.core.store
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        submodel: Submodel,
    ) -> TitanResult<(Vec<u8>, String)> {
        validation::validate_submodel(&submodel)?;
        let id = submodel.id.clone();
        let mut doc = to_doc(&submodel)?;

        let externalized = externalize_submodel_doc(&mut doc, &id, self.blob_store.as_ref())
            .await
            .map_err(TitanError::from)?;
        self.core.create(ctx, &id, doc, externalized.new_blobs).await
    }

    pub async fn get(&self, ctx: &TenantContext, id: &str) -> TitanResult<(Vec<u8>, String)> {
        let row = self.core.get(ctx, id).await?;
        Ok((row.doc_bytes, row.etag))
    }

    pub async fn get_doc(&self, ctx: &TenantContext, id: &str) -> TitanResult<Value> {
        Ok(self.core.get(ctx, id).await?.doc)
    }

    pub(crate) async fn get_row(&self, ctx: &TenantContext, id: &str) -> TitanResult<EntityRow> {
        self.core.get(ctx, id).await
    }

    pub async fn list(
        &self,
        ctx: &TenantContext,
        cursor: Option<&str>,
        limit: Option<usize>,
        filter: &ListFilter,
    ) -> TitanResult<EntityPage> {
        self.core.list(ctx, cursor, limit, filter).await
    }

    pub async fn replace(
        &self,
        ctx: &TenantContext,
        id: &str,
        submodel: Submodel,
        if_match: &IfMatch,
    ) -> TitanResult<(Vec<u8>, String)> {
        validation::validate_submodel(&submodel)?;
        if submodel.id != id {
            return Err(TitanError::bad_request(
                "body id does not match the addressed identifier",
            ));
        }
        let doc = to_doc(&submodel)?;
        self.replace_doc(ctx, id, doc, if_match).await
    }

    pub async fn patch(
        &self,
        ctx: &TenantContext,
        id: &str,
        patch: &Value,
        if_match: &IfMatch,
    ) -> TitanResult<(Vec<u8>, String)> {
        let mut doc = self.core.get(ctx, id).await?.doc;
        merge_patch(&mut doc, patch);
        let submodel: Submodel = serde_json::from_value(doc)
            .map_err(|e| TitanError::bad_request(format!("patched submodel is invalid: {e}")))?;
        self.replace(ctx, id, submodel, if_match).await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        id: &str,
        if_match: &IfMatch,
    ) -> TitanResult<()> {
        let removed = self.core.delete(ctx, id, if_match).await?;
        self.drop_blob_bytes(&removed).await;
        Ok(())
    }

    /// Shared rewrite path: externalize, diff blob ownership, swap the
    /// row atomically, emit `UPDATED`, then drop orphaned bytes.
    pub(crate) async fn replace_doc(
        &self,
        ctx: &TenantContext,
        id: &str,
        mut doc: Value,
        if_match: &IfMatch,
    ) -> TitanResult<(Vec<u8>, String)> {
        let externalized = externalize_submodel_doc(&mut doc, id, self.blob_store.as_ref())
            .await
            .map_err(TitanError::from)?;

        let kept: HashSet<String> = externalized
            .referenced
            .iter()
            .map(|(blob_id, _)| blob_id.clone())
            .chain(externalized.new_blobs.iter().map(|b| b.id.to_string()))
            .collect();
        let orphaned: Vec<BlobMetadata> = self
            .core
            .store
            .blob_rows_for_submodel(ctx, id)
            .await?
            .into_iter()
            .filter(|blob| !kept.contains(&blob.id.to_string()))
            .collect();
        let removed_ids = orphaned.iter().map(|b| b.id.to_string()).collect();

        let result = self
            .core
            .replace(ctx, id, doc, if_match, externalized.new_blobs, removed_ids)
            .await?;
        self.drop_blob_bytes(&orphaned).await;
        Ok(result)
    }

    /// Publish a submodel-element event after a successful element write.
    pub(crate) async fn emit_element_event(
        &self,
        submodel_id: &str,
        id_short_path: &str,
        event_type: EventType,
        value_bytes: Option<Vec<u8>>,
    ) {
        let event = EventEnvelope::new(EntityKind::SubmodelElement, event_type, submodel_id)
            .with_element(id_short_path, value_bytes);
        if let Err(error) = self.core.bus.publish(event).await {
            warn!(%error, "element event publish failed after commit");
        }
    }

    /// Best-effort removal of stored bytes after their rows are gone.
    pub(crate) async fn drop_blob_bytes(&self, blobs: &[BlobMetadata]) {
        for blob in blobs {
            if let Err(error) = self.blob_store.delete(blob).await {
                warn!(blob_id = %blob.id, %error, "failed to delete externalized blob content");
            }
        }
    }
}

pub(crate) fn to_doc(submodel: &Submodel) -> TitanResult<Value> {
    serde_json::to_value(submodel)
        .map_err(|e| TitanError::internal_from("submodel serialization failed", e))
}
