//! Local filesystem backend.
//!
//! Layout: `{root}/{shard}/{submodel_b64}/{blob_id}` where `shard` is the
//! first two characters of the blob id, keeping directories small under
//! heavy write load. Reads stream in configurable-size chunks so large
//! downloads never buffer whole files.

use std::path::{Path, PathBuf};

use async_stream::try_stream;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::debug;

use titan_core::encode_id;

use crate::config::BlobConfig;
use crate::error::{BlobError, BlobResult};
use crate::store::BlobStore;
use crate::types::{BlobMetadata, ByteStream};

const LOCAL_URI_SCHEME: &str = "local://";

/// Filesystem-backed blob store.
pub struct LocalBlobStore {
    root: PathBuf,
    config: BlobConfig,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, config: BlobConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    fn relative_key(submodel_id: &str, blob_id: &str) -> String {
        let shard = &blob_id[..2.min(blob_id.len())];
        format!("{shard}/{}/{blob_id}", encode_id(submodel_id))
    }

    fn path_from_uri(&self, storage_uri: &str) -> BlobResult<PathBuf> {
        let relative = storage_uri
            .strip_prefix(LOCAL_URI_SCHEME)
            .ok_or_else(|| BlobError::invalid(format!("not a local URI: {storage_uri}")))?;
        if relative.split('/').any(|part| part == "..") {
            return Err(BlobError::invalid("path traversal in storage URI"));
        }
        Ok(self.root.join(relative))
    }

    async fn open(&self, metadata: &BlobMetadata) -> BlobResult<fs::File> {
        let path = self.path_from_uri(&metadata.storage_uri)?;
        fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BlobError::not_found(metadata.id.as_str())
            } else {
                BlobError::from(e)
            }
        })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
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
        let key = Self::relative_key(submodel_id, metadata.id.as_str());
        let path = self.root.join(&key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &content).await?;
        debug!(blob_id = %metadata.id, size = content.len(), "stored local blob");

        Ok(BlobMetadata {
            storage_uri: format!("{LOCAL_URI_SCHEME}{key}"),
            ..metadata
        })
    }

    async fn retrieve(&self, metadata: &BlobMetadata) -> BlobResult<Bytes> {
        let path = self.path_from_uri(&metadata.storage_uri)?;
        match fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::not_found(metadata.id.as_str()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn stream(&self, metadata: &BlobMetadata) -> BlobResult<ByteStream> {
        let mut file = self.open(metadata).await?;
        let chunk_size = self.config.chunk_size_bytes;

        let stream = try_stream! {
            let mut buffer = vec![0u8; chunk_size];
            loop {
                let read = file.read(&mut buffer).await?;
                if read == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buffer[..read]);
            }
        };
        Ok(Box::pin(stream))
    }

    async fn delete(&self, metadata: &BlobMetadata) -> BlobResult<()> {
        let path = self.path_from_uri(&metadata.storage_uri)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                prune_empty_parents(&self.root, &path).await;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, metadata: &BlobMetadata) -> BlobResult<bool> {
        let path = self.path_from_uri(&metadata.storage_uri)?;
        Ok(fs::try_exists(&path).await?)
    }

    fn should_externalize(&self, content: &[u8], _content_type: &str) -> bool {
        content.len() > self.config.inline_threshold_bytes
    }

    async fn health_check(&self) -> bool {
        fs::create_dir_all(&self.root).await.is_ok()
    }
}

/// Best-effort removal of emptied shard directories after delete.
async fn prune_empty_parents(root: &Path, path: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == root || fs::remove_dir(dir).await.is_err() {
            break;
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn temp_store(chunk_size: usize) -> LocalBlobStore {
        let root = std::env::temp_dir()
            .join("titan-blob-tests")
            .join(uuid::Uuid::new_v4().to_string());
        LocalBlobStore::new(
            root,
            BlobConfig::default()
                .with_inline_threshold(16)
                .with_chunk_size(chunk_size),
        )
    }

    #[tokio::test]
    async fn store_retrieve_delete_roundtrip() {
        let store = temp_store(1024);
        let content = Bytes::from_static(b"industrial payload bytes");

        let metadata = store
            .store("urn:example:sm:1", "doc", content.clone(), "text/plain", None)
            .await
            .unwrap();
        assert!(metadata.storage_uri.starts_with("local://"));
        assert_eq!(metadata.size_bytes, content.len() as u64);

        assert!(store.exists(&metadata).await.unwrap());
        assert_eq!(store.retrieve(&metadata).await.unwrap(), content);

        store.delete(&metadata).await.unwrap();
        assert!(!store.exists(&metadata).await.unwrap());
        assert!(matches!(
            store.retrieve(&metadata).await,
            Err(BlobError::NotFound { .. })
        ));
        // delete is idempotent
        store.delete(&metadata).await.unwrap();
    }

    #[tokio::test]
    async fn stream_chunks_are_bounded() {
        let store = temp_store(4);
        let content = Bytes::from_static(b"0123456789");
        let metadata = store
            .store("urn:example:sm:1", "doc", content.clone(), "text/plain", None)
            .await
            .unwrap();

        let mut stream = store.stream(&metadata).await.unwrap();
        let mut collected = Vec::new();
        let mut chunks = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            assert!(chunk.len() <= 4);
            collected.extend_from_slice(&chunk);
            chunks += 1;
        }
        assert_eq!(collected, content);
        assert_eq!(chunks, 3);
    }

    #[tokio::test]
    async fn threshold_gates_externalization() {
        let store = temp_store(1024);
        assert!(!store.should_externalize(b"small", "text/plain"));
        assert!(store.should_externalize(&vec![0u8; 17], "text/plain"));
    }
}
