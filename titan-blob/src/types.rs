use std::pin::Pin;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stream of byte chunks for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Unique identifier for a stored blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobId(pub String);

impl BlobId {
    /// Generate a new random blob ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BlobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata row for an externalized blob.
///
/// The database owns this row; the store owns the bytes behind
/// `storage_uri`. A blob lives exactly as long as the submodel element
/// referring to it - deleting the submodel cascades here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub id: BlobId,
    pub submodel_id: String,
    pub id_short_path: String,
    /// Backend-internal URI (`local://…`, `s3://bucket/key`); never
    /// exposed on the wire.
    pub storage_uri: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Hex SHA-256 of the content.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl BlobMetadata {
    pub fn new(
        submodel_id: impl Into<String>,
        id_short_path: impl Into<String>,
        storage_uri: impl Into<String>,
        content_type: impl Into<String>,
        content: &[u8],
    ) -> Self {
        Self {
            id: BlobId::new(),
            submodel_id: submodel_id.into(),
            id_short_path: id_short_path.into(),
            storage_uri: storage_uri.into(),
            content_type: content_type.into(),
            size_bytes: content.len() as u64,
            content_hash: content_hash(content),
            created_at: Utc::now(),
        }
    }
}

/// Hex SHA-256 digest of blob content.
pub fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
