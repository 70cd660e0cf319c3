//! Asset Administration Shell repository.

use std::sync::Arc;

use serde_json::Value;

use titan_core::{EntityKind, TenantContext, TitanError, TitanResult};
use titan_events::EventBus;
use titan_model::{validation, AssetAdministrationShell};
use titan_projection::merge_patch;

use crate::repo::{EntityPage, IfMatch, RepoCore};
use crate::store::{DocumentStore, ListFilter};

/// CRUD for shells with `globalAssetId`/`specificAssetIds` indexing.
#[derive(Clone)]
pub struct ShellRepository {
    core: RepoCore,
}

impl ShellRepository {
    pub fn new(store: Arc<dyn DocumentStore>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            core: RepoCore::new(store, bus, EntityKind::Aas),
        }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        shell: AssetAdministrationShell,
    ) -> TitanResult<(Vec<u8>, String)> {
        validation::validate_shell(&shell)?;
        let id = shell.id.clone();
        let doc = to_doc(&shell)?;
        self.core.create(ctx, &id, doc, Vec::new()).await
    }

    pub async fn get(&self, ctx: &TenantContext, id: &str) -> TitanResult<(Vec<u8>, String)> {
        let row = self.core.get(ctx, id).await?;
        Ok((row.doc_bytes, row.etag))
    }

    /// The indexable document, for projection reads.
    pub async fn get_doc(&self, ctx: &TenantContext, id: &str) -> TitanResult<Value> {
        Ok(self.core.get(ctx, id).await?.doc)
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
        shell: AssetAdministrationShell,
        if_match: &IfMatch,
    ) -> TitanResult<(Vec<u8>, String)> {
        validation::validate_shell(&shell)?;
        if shell.id != id {
            return Err(TitanError::bad_request(
                "body id does not match the addressed identifier",
            ));
        }
        let doc = to_doc(&shell)?;
        self.core
            .replace(ctx, id, doc, if_match, Vec::new(), Vec::new())
            .await
    }

    /// Merge-patch the stored document, then validate and replace.
    pub async fn patch(
        &self,
        ctx: &TenantContext,
        id: &str,
        patch: &Value,
        if_match: &IfMatch,
    ) -> TitanResult<(Vec<u8>, String)> {
        let mut doc = self.core.get(ctx, id).await?.doc;
        merge_patch(&mut doc, patch);
        let shell: AssetAdministrationShell = serde_json::from_value(doc)
            .map_err(|e| TitanError::bad_request(format!("patched shell is invalid: {e}")))?;
        self.replace(ctx, id, shell, if_match).await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        id: &str,
        if_match: &IfMatch,
    ) -> TitanResult<()> {
        self.core.delete(ctx, id, if_match).await?;
        Ok(())
    }
}

fn to_doc(shell: &AssetAdministrationShell) -> TitanResult<Value> {
    serde_json::to_value(shell)
        .map_err(|e| TitanError::internal_from("shell serialization failed", e))
}
