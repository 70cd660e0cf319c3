//! Storage seam.
//!
//! The document store owns the authoritative entity state. Each row keeps
//! the dual representation plus the indexed filter columns; the trait is
//! the point where a SQL backend replaces the in-memory reference
//! implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use titan_blob::BlobMetadata;
use titan_core::{EntityKind, TenantContext, TitanResult};

use crate::invocations::OperationInvocation;

/// One persisted entity.
#[derive(Debug, Clone)]
pub struct EntityRow {
    pub id: String,
    pub id_b64: String,
    /// Indexable structured document.
    pub doc: Value,
    /// Byte-identical canonical form; input to the ETag.
    pub doc_bytes: Vec<u8>,
    pub etag: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tenant_id: String,

    // indexed filter columns
    pub global_asset_id: Option<String>,
    pub specific_asset_ids: Vec<(String, String)>,
    pub semantic_id: Option<String>,
    pub id_short: Option<String>,
}

/// Server-side list filters backed by the index columns.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub id_short: Option<String>,
    pub semantic_id: Option<String>,
}

/// A page of rows plus the continuation cursor.
#[derive(Debug, Clone)]
pub struct RowPage {
    pub rows: Vec<EntityRow>,
    pub next_cursor: Option<String>,
}

/// Authoritative storage for entities, blob metadata rows and operation
/// invocations.
///
/// Contract: `insert`/`replace`/`delete` are atomic per call, including
/// the blob-row bookkeeping they carry. Reads returning both doc and
/// bytes read them from the same committed row.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new row; `Conflict` when the id already exists in the
    /// tenant. Referenced blob metadata rows persist in the same commit.
    async fn insert(
        &self,
        kind: EntityKind,
        ctx: &TenantContext,
        row: EntityRow,
        new_blobs: Vec<BlobMetadata>,
    ) -> TitanResult<()>;

    async fn get(
        &self,
        kind: EntityKind,
        ctx: &TenantContext,
        id: &str,
    ) -> TitanResult<Option<EntityRow>>;

    /// Stable order by `created_at` then `id`; cursor is opaque.
    async fn list(
        &self,
        kind: EntityKind,
        ctx: &TenantContext,
        cursor: Option<&str>,
        limit: usize,
        filter: &ListFilter,
    ) -> TitanResult<RowPage>;

    /// Replace an existing row, keeping `created_at`. Blob rows listed in
    /// `removed_blob_ids` are deleted and `new_blobs` inserted atomically
    /// with the row swap.
    async fn replace(
        &self,
        kind: EntityKind,
        ctx: &TenantContext,
        row: EntityRow,
        new_blobs: Vec<BlobMetadata>,
        removed_blob_ids: Vec<String>,
    ) -> TitanResult<()>;

    /// Delete the row and every blob row of the entity. Returns the
    /// removed blob metadata so the caller can drop the stored bytes.
    async fn delete(
        &self,
        kind: EntityKind,
        ctx: &TenantContext,
        id: &str,
    ) -> TitanResult<Vec<BlobMetadata>>;

    // ---- blob metadata rows ----

    async fn get_blob_row(
        &self,
        ctx: &TenantContext,
        blob_id: &str,
    ) -> TitanResult<Option<BlobMetadata>>;

    async fn blob_rows_for_submodel(
        &self,
        ctx: &TenantContext,
        submodel_id: &str,
    ) -> TitanResult<Vec<BlobMetadata>>;

    /// Every blob row of the tenant (cleanup sweeps).
    async fn all_blob_rows(&self, ctx: &TenantContext) -> TitanResult<Vec<BlobMetadata>>;

    async fn delete_blob_row(&self, ctx: &TenantContext, blob_id: &str) -> TitanResult<()>;

    // ---- operation invocations ----

    async fn insert_invocation(
        &self,
        ctx: &TenantContext,
        invocation: OperationInvocation,
    ) -> TitanResult<()>;

    async fn get_invocation(
        &self,
        ctx: &TenantContext,
        invocation_id: &str,
    ) -> TitanResult<Option<OperationInvocation>>;

    async fn update_invocation(
        &self,
        ctx: &TenantContext,
        invocation: OperationInvocation,
    ) -> TitanResult<()>;

    /// Connectivity probe for readiness reporting.
    async fn health_check(&self) -> bool;
}
