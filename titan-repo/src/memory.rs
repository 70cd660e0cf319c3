//! In-memory reference implementation of the document store.
//!
//! Single-node backend with the same atomicity contract a SQL backend
//! provides: every trait call takes the state lock once, so row swaps and
//! their blob-row bookkeeping commit together.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use titan_blob::BlobMetadata;
use titan_core::{EntityKind, TenantContext, TitanError, TitanResult};

use crate::invocations::OperationInvocation;
use crate::repo::{decode_cursor, encode_cursor};
use crate::store::{DocumentStore, EntityRow, ListFilter, RowPage};

type EntityKey = (EntityKind, String, String);

#[derive(Default)]
struct StoreState {
    entities: HashMap<EntityKey, EntityRow>,
    /// (tenant, blob_id) -> metadata
    blobs: HashMap<(String, String), BlobMetadata>,
    /// (tenant, invocation_id) -> invocation
    invocations: HashMap<(String, String), OperationInvocation>,
}

/// HashMap-backed document store.
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: RwLock<StoreState>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(kind: EntityKind, ctx: &TenantContext, id: &str) -> EntityKey {
        (kind, ctx.tenant_id.0.clone(), id.to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(
        &self,
        kind: EntityKind,
        ctx: &TenantContext,
        row: EntityRow,
        new_blobs: Vec<BlobMetadata>,
    ) -> TitanResult<()> {
        let key = Self::key(kind, ctx, &row.id);
        let mut state = self.state.write();
        if state.entities.contains_key(&key) {
            return Err(TitanError::conflict(format!(
                "{} with id '{}' already exists",
                kind.as_str(),
                row.id
            )));
        }
        for blob in new_blobs {
            state
                .blobs
                .insert((ctx.tenant_id.0.clone(), blob.id.to_string()), blob);
        }
        state.entities.insert(key, row);
        Ok(())
    }

    async fn get(
        &self,
        kind: EntityKind,
        ctx: &TenantContext,
        id: &str,
    ) -> TitanResult<Option<EntityRow>> {
        let state = self.state.read();
        Ok(state.entities.get(&Self::key(kind, ctx, id)).cloned())
    }

    async fn list(
        &self,
        kind: EntityKind,
        ctx: &TenantContext,
        cursor: Option<&str>,
        limit: usize,
        filter: &ListFilter,
    ) -> TitanResult<RowPage> {
        let after = cursor.map(decode_cursor).transpose()?;
        let state = self.state.read();

        let mut rows: Vec<&EntityRow> = state
            .entities
            .iter()
            .filter(|((row_kind, tenant, _), _)| {
                *row_kind == kind && *tenant == ctx.tenant_id.0
            })
            .map(|(_, row)| row)
            .filter(|row| {
                filter
                    .id_short
                    .as_ref()
                    .map(|wanted| row.id_short.as_deref() == Some(wanted.as_str()))
                    .unwrap_or(true)
                    && filter
                        .semantic_id
                        .as_ref()
                        .map(|wanted| row.semantic_id.as_deref() == Some(wanted.as_str()))
                        .unwrap_or(true)
            })
            .collect();
        rows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        if let Some((after_created, after_id)) = after {
            rows.retain(|row| {
                (row.created_at, row.id.as_str()) > (after_created, after_id.as_str())
            });
        }

        let next_cursor = if rows.len() > limit {
            rows.get(limit - 1)
                .map(|row| encode_cursor(row.created_at, &row.id))
        } else {
            None
        };
        rows.truncate(limit);

        Ok(RowPage {
            rows: rows.into_iter().cloned().collect(),
            next_cursor,
        })
    }

    async fn replace(
        &self,
        kind: EntityKind,
        ctx: &TenantContext,
        row: EntityRow,
        new_blobs: Vec<BlobMetadata>,
        removed_blob_ids: Vec<String>,
    ) -> TitanResult<()> {
        let key = Self::key(kind, ctx, &row.id);
        let mut state = self.state.write();
        if !state.entities.contains_key(&key) {
            return Err(TitanError::not_found(format!(
                "{} with id '{}' not found",
                kind.as_str(),
                row.id
            )));
        }
        for blob_id in removed_blob_ids {
            state.blobs.remove(&(ctx.tenant_id.0.clone(), blob_id));
        }
        for blob in new_blobs {
            state
                .blobs
                .insert((ctx.tenant_id.0.clone(), blob.id.to_string()), blob);
        }
        state.entities.insert(key, row);
        Ok(())
    }

    async fn delete(
        &self,
        kind: EntityKind,
        ctx: &TenantContext,
        id: &str,
    ) -> TitanResult<Vec<BlobMetadata>> {
        let key = Self::key(kind, ctx, id);
        let mut state = self.state.write();
        if state.entities.remove(&key).is_none() {
            return Err(TitanError::not_found(format!(
                "{} with id '{id}' not found",
                kind.as_str()
            )));
        }
        let mut removed = Vec::new();
        state.blobs.retain(|(tenant, _), blob| {
            let cascade = tenant == &ctx.tenant_id.0 && blob.submodel_id == id;
            if cascade {
                removed.push(blob.clone());
            }
            !cascade
        });
        Ok(removed)
    }

    async fn get_blob_row(
        &self,
        ctx: &TenantContext,
        blob_id: &str,
    ) -> TitanResult<Option<BlobMetadata>> {
        let state = self.state.read();
        Ok(state
            .blobs
            .get(&(ctx.tenant_id.0.clone(), blob_id.to_string()))
            .cloned())
    }

    async fn blob_rows_for_submodel(
        &self,
        ctx: &TenantContext,
        submodel_id: &str,
    ) -> TitanResult<Vec<BlobMetadata>> {
        let state = self.state.read();
        Ok(state
            .blobs
            .iter()
            .filter(|((tenant, _), blob)| {
                tenant == &ctx.tenant_id.0 && blob.submodel_id == submodel_id
            })
            .map(|(_, blob)| blob.clone())
            .collect())
    }

    async fn all_blob_rows(&self, ctx: &TenantContext) -> TitanResult<Vec<BlobMetadata>> {
        let state = self.state.read();
        Ok(state
            .blobs
            .iter()
            .filter(|((tenant, _), _)| tenant == &ctx.tenant_id.0)
            .map(|(_, blob)| blob.clone())
            .collect())
    }

    async fn delete_blob_row(&self, ctx: &TenantContext, blob_id: &str) -> TitanResult<()> {
        let mut state = self.state.write();
        state
            .blobs
            .remove(&(ctx.tenant_id.0.clone(), blob_id.to_string()));
        Ok(())
    }

    async fn insert_invocation(
        &self,
        ctx: &TenantContext,
        invocation: OperationInvocation,
    ) -> TitanResult<()> {
        let mut state = self.state.write();
        state.invocations.insert(
            (ctx.tenant_id.0.clone(), invocation.invocation_id.clone()),
            invocation,
        );
        Ok(())
    }

    async fn get_invocation(
        &self,
        ctx: &TenantContext,
        invocation_id: &str,
    ) -> TitanResult<Option<OperationInvocation>> {
        let state = self.state.read();
        Ok(state
            .invocations
            .get(&(ctx.tenant_id.0.clone(), invocation_id.to_string()))
            .cloned())
    }

    async fn update_invocation(
        &self,
        ctx: &TenantContext,
        invocation: OperationInvocation,
    ) -> TitanResult<()> {
        let key = (ctx.tenant_id.0.clone(), invocation.invocation_id.clone());
        let mut state = self.state.write();
        if !state.invocations.contains_key(&key) {
            return Err(TitanError::not_found(format!(
                "invocation '{}' not found",
                invocation.invocation_id
            )));
        }
        state.invocations.insert(key, invocation);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
