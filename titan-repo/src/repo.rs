//! Shared repository plumbing: row preparation, conditional requests,
//! cursor codec and the generic CRUD core the typed repositories wrap.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::instrument;

use titan_blob::BlobMetadata;
use titan_core::{
    canonicalize, canonicalize_to_value, encode_id, etag_hex, EntityKind, TenantContext,
    TitanError, TitanResult,
};
use titan_events::{EventBus, EventEnvelope, EventType};

use crate::store::{DocumentStore, EntityRow, ListFilter};

/// Paging bounds from the IDTA pagination contract.
pub const DEFAULT_PAGE_LIMIT: usize = 100;
pub const MAX_PAGE_LIMIT: usize = 1000;

/// Parsed `If-Match` precondition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IfMatch {
    /// Header absent: last-writer-wins.
    #[default]
    Any,
    /// `*`: matches any existing entity.
    Wildcard,
    /// A specific ETag that must equal the current one.
    Exact(String),
}

impl IfMatch {
    /// Parse a raw header value; strong-ETag quotes are stripped.
    pub fn parse(header: Option<&str>) -> Self {
        match header {
            None => Self::Any,
            Some("*") => Self::Wildcard,
            Some(raw) => Self::Exact(raw.trim_matches('"').to_string()),
        }
    }

    /// Check against the current ETag; exactly one racing writer passes.
    pub fn check(&self, current_etag: &str) -> TitanResult<()> {
        match self {
            Self::Any | Self::Wildcard => Ok(()),
            Self::Exact(expected) if expected == current_etag => Ok(()),
            Self::Exact(_) => Err(TitanError::precondition_failed(
                "If-Match does not match the current ETag",
            )),
        }
    }
}

/// A page of `(canonical_bytes, etag)` tuples.
#[derive(Debug, Clone)]
pub struct EntityPage {
    pub items: Vec<(Vec<u8>, String)>,
    pub next_cursor: Option<String>,
}

pub(crate) fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

pub(crate) fn encode_cursor(created_at: DateTime<Utc>, id: &str) -> String {
    let raw = format!("{}|{id}", created_at.timestamp_nanos_opt().unwrap_or(0));
    URL_SAFE_NO_PAD.encode(raw)
}

pub(crate) fn decode_cursor(cursor: &str) -> TitanResult<(DateTime<Utc>, String)> {
    let invalid = || TitanError::bad_request("invalid cursor");
    let raw = URL_SAFE_NO_PAD
        .decode(cursor.as_bytes())
        .map_err(|_| invalid())?;
    let raw = String::from_utf8(raw).map_err(|_| invalid())?;
    let (nanos, id) = raw.split_once('|').ok_or_else(invalid)?;
    let nanos: i64 = nanos.parse().map_err(|_| invalid())?;
    Ok((DateTime::from_timestamp_nanos(nanos), id.to_string()))
}

/// Index columns extracted from a document at write time.
fn extract_indexes(doc: &Value, row: &mut EntityRow) {
    row.id_short = doc
        .get("idShort")
        .and_then(Value::as_str)
        .map(str::to_string);
    row.global_asset_id = doc
        .pointer("/assetInformation/globalAssetId")
        .or_else(|| doc.get("globalAssetId"))
        .and_then(Value::as_str)
        .map(str::to_string);
    row.semantic_id = doc
        .pointer("/semanticId/keys/0/value")
        .and_then(Value::as_str)
        .map(str::to_string);
    row.specific_asset_ids = doc
        .pointer("/assetInformation/specificAssetIds")
        .or_else(|| doc.get("specificAssetIds"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    Some((
                        item.get("name")?.as_str()?.to_string(),
                        item.get("value")?.as_str()?.to_string(),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();
}

/// Build the dual-representation row for a document.
pub(crate) fn prepare_row(
    ctx: &TenantContext,
    id: &str,
    doc: Value,
    created_at: Option<DateTime<Utc>>,
) -> TitanResult<EntityRow> {
    let normalized = canonicalize_to_value(&doc)?;
    let doc_bytes = canonicalize(&normalized)?;
    let etag = etag_hex(&doc_bytes);
    let now = Utc::now();

    let mut row = EntityRow {
        id: id.to_string(),
        id_b64: encode_id(id),
        doc: normalized,
        doc_bytes,
        etag,
        created_at: created_at.unwrap_or(now),
        updated_at: now,
        tenant_id: ctx.tenant_id.0.clone(),
        global_asset_id: None,
        specific_asset_ids: Vec::new(),
        semantic_id: None,
        id_short: None,
    };
    let doc = row.doc.clone();
    extract_indexes(&doc, &mut row);
    Ok(row)
}

/// Generic CRUD core shared by the typed repositories.
///
/// Mutations commit through the store first and publish their event only
/// afterwards; a failed publish is logged by the bus layer and never fails
/// the inbound request.
#[derive(Clone)]
pub(crate) struct RepoCore {
    pub store: Arc<dyn DocumentStore>,
    pub bus: Arc<dyn EventBus>,
    pub kind: EntityKind,
}

impl RepoCore {
    pub fn new(store: Arc<dyn DocumentStore>, bus: Arc<dyn EventBus>, kind: EntityKind) -> Self {
        Self { store, bus, kind }
    }

    async fn emit(&self, event: EventEnvelope) {
        if let Err(error) = self.bus.publish(event).await {
            // DB stays authoritative; delivery is at-least-once on retry paths
            tracing::warn!(%error, "event publish failed after commit");
        }
    }

    #[instrument(skip_all, fields(kind = self.kind.as_str(), id = %id))]
    pub async fn create(
        &self,
        ctx: &TenantContext,
        id: &str,
        doc: Value,
        new_blobs: Vec<BlobMetadata>,
    ) -> TitanResult<(Vec<u8>, String)> {
        let row = prepare_row(ctx, id, doc, None)?;
        let (doc_bytes, etag) = (row.doc_bytes.clone(), row.etag.clone());
        self.store.insert(self.kind, ctx, row, new_blobs).await?;

        self.emit(
            EventEnvelope::new(self.kind, EventType::Created, id)
                .with_doc(doc_bytes.clone(), etag.clone()),
        )
        .await;
        Ok((doc_bytes, etag))
    }

    pub async fn get(&self, ctx: &TenantContext, id: &str) -> TitanResult<EntityRow> {
        self.store.get(self.kind, ctx, id).await?.ok_or_else(|| {
            TitanError::not_found(format!("{} with id '{id}' not found", self.kind.as_str()))
        })
    }

    pub async fn list(
        &self,
        ctx: &TenantContext,
        cursor: Option<&str>,
        limit: Option<usize>,
        filter: &ListFilter,
    ) -> TitanResult<EntityPage> {
        let page = self
            .store
            .list(self.kind, ctx, cursor, clamp_limit(limit), filter)
            .await?;
        Ok(EntityPage {
            items: page
                .rows
                .into_iter()
                .map(|row| (row.doc_bytes, row.etag))
                .collect(),
            next_cursor: page.next_cursor,
        })
    }

    /// Replace with precondition; cascades blob bookkeeping when given.
    #[instrument(skip_all, fields(kind = self.kind.as_str(), id = %id))]
    pub async fn replace(
        &self,
        ctx: &TenantContext,
        id: &str,
        doc: Value,
        if_match: &IfMatch,
        new_blobs: Vec<BlobMetadata>,
        removed_blob_ids: Vec<String>,
    ) -> TitanResult<(Vec<u8>, String)> {
        let current = self.get(ctx, id).await?;
        if_match.check(&current.etag)?;

        let row = prepare_row(ctx, id, doc, Some(current.created_at))?;
        let (doc_bytes, etag) = (row.doc_bytes.clone(), row.etag.clone());
        self.store
            .replace(self.kind, ctx, row, new_blobs, removed_blob_ids)
            .await?;

        self.emit(
            EventEnvelope::new(self.kind, EventType::Updated, id)
                .with_doc(doc_bytes.clone(), etag.clone()),
        )
        .await;
        Ok((doc_bytes, etag))
    }

    /// Conditional delete. Returns the cascaded blob rows.
    #[instrument(skip_all, fields(kind = self.kind.as_str(), id = %id))]
    pub async fn delete(
        &self,
        ctx: &TenantContext,
        id: &str,
        if_match: &IfMatch,
    ) -> TitanResult<Vec<BlobMetadata>> {
        let current = self.get(ctx, id).await?;
        if_match.check(&current.etag)?;

        let removed = self.store.delete(self.kind, ctx, id).await?;
        self.emit(EventEnvelope::new(self.kind, EventType::Deleted, id))
            .await;
        Ok(removed)
    }
}
