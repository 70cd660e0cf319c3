//! Registry descriptor repositories.
//!
//! Descriptors are registry-only records; they share the dual-storage and
//! conditional-request machinery with the hosted entities but never carry
//! blobs or submodel elements.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use titan_core::{EntityKind, TenantContext, TitanError, TitanResult};
use titan_events::EventBus;
use titan_model::{AssetAdministrationShellDescriptor, SubmodelDescriptor};

use crate::repo::{EntityPage, IfMatch, RepoCore};
use crate::store::{DocumentStore, ListFilter};

/// One repository per descriptor kind, both backed by the same core.
#[derive(Clone)]
pub struct DescriptorRepository {
    shells: RepoCore,
    submodels: RepoCore,
}

impl DescriptorRepository {
    pub fn new(store: Arc<dyn DocumentStore>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            shells: RepoCore::new(store.clone(), bus.clone(), EntityKind::ShellDescriptor),
            submodels: RepoCore::new(store, bus, EntityKind::SubmodelDescriptor),
        }
    }

    pub async fn create_shell_descriptor(
        &self,
        ctx: &TenantContext,
        descriptor: AssetAdministrationShellDescriptor,
    ) -> TitanResult<(Vec<u8>, String)> {
        let id = descriptor.id.clone();
        self.shells
            .create(ctx, &id, to_doc(&descriptor)?, Vec::new())
            .await
    }

    pub async fn get_shell_descriptor(
        &self,
        ctx: &TenantContext,
        id: &str,
    ) -> TitanResult<(Vec<u8>, String)> {
        let row = self.shells.get(ctx, id).await?;
        Ok((row.doc_bytes, row.etag))
    }

    pub async fn list_shell_descriptors(
        &self,
        ctx: &TenantContext,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> TitanResult<EntityPage> {
        self.shells
            .list(ctx, cursor, limit, &ListFilter::default())
            .await
    }

    pub async fn replace_shell_descriptor(
        &self,
        ctx: &TenantContext,
        id: &str,
        descriptor: AssetAdministrationShellDescriptor,
        if_match: &IfMatch,
    ) -> TitanResult<(Vec<u8>, String)> {
        check_id(&descriptor.id, id)?;
        self.shells
            .replace(ctx, id, to_doc(&descriptor)?, if_match, Vec::new(), Vec::new())
            .await
    }

    pub async fn delete_shell_descriptor(
        &self,
        ctx: &TenantContext,
        id: &str,
        if_match: &IfMatch,
    ) -> TitanResult<()> {
        self.shells.delete(ctx, id, if_match).await?;
        Ok(())
    }

    pub async fn create_submodel_descriptor(
        &self,
        ctx: &TenantContext,
        descriptor: SubmodelDescriptor,
    ) -> TitanResult<(Vec<u8>, String)> {
        let id = descriptor.id.clone();
        self.submodels
            .create(ctx, &id, to_doc(&descriptor)?, Vec::new())
            .await
    }

    pub async fn get_submodel_descriptor(
        &self,
        ctx: &TenantContext,
        id: &str,
    ) -> TitanResult<(Vec<u8>, String)> {
        let row = self.submodels.get(ctx, id).await?;
        Ok((row.doc_bytes, row.etag))
    }

    /// Optionally filtered by indexed `semanticId`.
    pub async fn list_submodel_descriptors(
        &self,
        ctx: &TenantContext,
        cursor: Option<&str>,
        limit: Option<usize>,
        semantic_id: Option<&str>,
    ) -> TitanResult<EntityPage> {
        let filter = ListFilter {
            semantic_id: semantic_id.map(str::to_string),
            ..ListFilter::default()
        };
        self.submodels.list(ctx, cursor, limit, &filter).await
    }

    pub async fn replace_submodel_descriptor(
        &self,
        ctx: &TenantContext,
        id: &str,
        descriptor: SubmodelDescriptor,
        if_match: &IfMatch,
    ) -> TitanResult<(Vec<u8>, String)> {
        check_id(&descriptor.id, id)?;
        self.submodels
            .replace(ctx, id, to_doc(&descriptor)?, if_match, Vec::new(), Vec::new())
            .await
    }

    pub async fn delete_submodel_descriptor(
        &self,
        ctx: &TenantContext,
        id: &str,
        if_match: &IfMatch,
    ) -> TitanResult<()> {
        self.submodels.delete(ctx, id, if_match).await?;
        Ok(())
    }
}

fn check_id(body_id: &str, addressed: &str) -> TitanResult<()> {
    if body_id != addressed {
        return Err(TitanError::bad_request(
            "body id does not match the addressed identifier",
        ));
    }
    Ok(())
}

fn to_doc<T: Serialize>(descriptor: &T) -> TitanResult<Value> {
    serde_json::to_value(descriptor)
        .map_err(|e| TitanError::internal_from("descriptor serialization failed", e))
}
