use async_trait::async_trait;
use bytes::Bytes;

use crate::types::{BlobMetadata, ByteStream};
use crate::BlobResult;

/// Core blob storage operations - must be implemented by all storage backends
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store content and return the metadata row describing it
    async fn store(
        &self,
        submodel_id: &str,
        id_short_path: &str,
        content: Bytes,
        content_type: &str,
        filename: Option<&str>,
    ) -> BlobResult<BlobMetadata>;

    /// Retrieve the full content of a blob
    async fn retrieve(&self, metadata: &BlobMetadata) -> BlobResult<Bytes>;

    /// Stream blob content in bounded chunks
    async fn stream(&self, metadata: &BlobMetadata) -> BlobResult<ByteStream>;

    /// Delete a blob; deleting an absent blob is not an error
    async fn delete(&self, metadata: &BlobMetadata) -> BlobResult<()>;

    /// Check whether the bytes behind a metadata row still exist
    async fn exists(&self, metadata: &BlobMetadata) -> BlobResult<bool>;

    /// Threshold check: content above the configured inline size is
    /// externalized on write
    fn should_externalize(&self, content: &[u8], content_type: &str) -> bool;

    /// Backend connectivity probe for health reporting
    async fn health_check(&self) -> bool;
}
