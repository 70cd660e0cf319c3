//! S3-compatible backend.
//!
//! Works against AWS S3 or any endpoint speaking the S3 API (MinIO, GCS
//! interop) via an endpoint override. Keys follow the same
//! `{prefix}/{shard}/{submodel_b64}/{blob_id}` layout as the local store;
//! the stored URI is `s3://{bucket}/{key}`.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream as S3ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tokio_util::io::ReaderStream;
use tracing::debug;

use titan_core::encode_id;

use crate::config::BlobConfig;
use crate::error::{BlobError, BlobResult};
use crate::store::BlobStore;
use crate::types::{BlobMetadata, ByteStream};

/// Blob store over any S3-compatible object service.
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
    prefix: String,
    config: BlobConfig,
}

impl S3CompatibleStore {
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>, config: BlobConfig) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
            config,
        }
    }

    /// Build a client from region/endpoint settings and the ambient AWS
    /// credential chain.
    pub async fn connect(
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        region: String,
        endpoint_url: Option<String>,
        config: BlobConfig,
    ) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region));
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let shared = loader.load().await;
        Self::new(Client::new(&shared), bucket, prefix, config)
    }

    fn object_key(&self, submodel_id: &str, blob_id: &str) -> String {
        object_key(&self.prefix, submodel_id, blob_id)
    }

    fn key_from_uri(&self, storage_uri: &str) -> BlobResult<String> {
        storage_uri
            .strip_prefix("s3://")
            .and_then(|rest| rest.split_once('/'))
            .map(|(_bucket, key)| key.to_string())
            .ok_or_else(|| BlobError::invalid(format!("not an s3 URI: {storage_uri}")))
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn store(
        &self,
        submodel_id: &str,
        id_short_path: &str,
        content: Bytes,
        content_type: &str,
        _filename: Option<&str>,
    ) -> BlobResult<BlobMetadata> {
        if content.len() as u64 > self.config.max_blob_bytes {
            return Err(BlobError::invalid(format!(
                "blob exceeds configured maximum of {} bytes",
                self.config.max_blob_bytes
            )));
        }

        let metadata = BlobMetadata::new(
            submodel_id,
            id_short_path,
            String::new(),
            content_type,
            &content,
        );
        let key = self.object_key(submodel_id, metadata.id.as_str());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(S3ByteStream::from(content))
            .send()
            .await
            .map_err(BlobError::backend)?;
        debug!(blob_id = %metadata.id, key = %key, "stored s3 blob");

        Ok(BlobMetadata {
            storage_uri: format!("s3://{}/{key}", self.bucket),
            ..metadata
        })
    }

    async fn retrieve(&self, metadata: &BlobMetadata) -> BlobResult<Bytes> {
        let key = self.key_from_uri(&metadata.storage_uri)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_get_error(e, metadata))?;
        let data = output
            .body
            .collect()
            .await
            .map_err(BlobError::backend)?;
        Ok(data.into_bytes())
    }

    async fn stream(&self, metadata: &BlobMetadata) -> BlobResult<ByteStream> {
        let key = self.key_from_uri(&metadata.storage_uri)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_get_error(e, metadata))?;

        let reader = output.body.into_async_read();
        let stream = ReaderStream::with_capacity(reader, self.config.chunk_size_bytes);
        Ok(Box::pin(stream))
    }

    async fn delete(&self, metadata: &BlobMetadata) -> BlobResult<()> {
        let key = self.key_from_uri(&metadata.storage_uri)?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(BlobError::backend)?;
        Ok(())
    }

    async fn exists(&self, metadata: &BlobMetadata) -> BlobResult<bool> {
        let key = self.key_from_uri(&metadata.storage_uri)?;
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if is_not_found(&e) {
                    Ok(false)
                } else {
                    Err(BlobError::backend(e))
                }
            }
        }
    }

    fn should_externalize(&self, content: &[u8], _content_type: &str) -> bool {
        content.len() > self.config.inline_threshold_bytes
    }

    async fn health_check(&self) -> bool {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
    }
}

fn object_key(prefix: &str, submodel_id: &str, blob_id: &str) -> String {
    let shard = &blob_id[..2.min(blob_id.len())];
    let key = format!("{shard}/{}/{blob_id}", encode_id(submodel_id));
    if prefix.is_empty() {
        key
    } else {
        format!("{}/{key}", prefix.trim_end_matches('/'))
    }
}

fn map_get_error(
    error: aws_sdk_s3::error::SdkError<aws_sdk_s3::operation::get_object::GetObjectError>,
    metadata: &BlobMetadata,
) -> BlobError {
    if matches!(
        error.as_service_error(),
        Some(e) if e.is_no_such_key()
    ) {
        BlobError::not_found(metadata.id.as_str())
    } else {
        BlobError::backend(error)
    }
}

fn is_not_found(
    error: &aws_sdk_s3::error::SdkError<aws_sdk_s3::operation::head_object::HeadObjectError>,
) -> bool {
    matches!(error.as_service_error(), Some(e) if e.is_not_found())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_sharded_and_prefixed() {
        let blob_id = "0c5b7f4e-1111-2222-3333-444455556666";
        let plain = object_key("", "urn:example:sm:1", blob_id);
        assert!(plain.starts_with("0c/"));
        assert!(plain.ends_with(blob_id));

        let prefixed = object_key("titan/", "urn:example:sm:1", blob_id);
        assert!(prefixed.starts_with("titan/0c/"));
    }
}
