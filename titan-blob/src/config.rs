/// Configuration for blob externalization and streaming
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Inline payloads at or below this size stay in the document
    pub inline_threshold_bytes: usize,

    /// Chunk size for streaming reads
    pub chunk_size_bytes: usize,

    /// Absolute max size allowed for a single blob (safety guard)
    pub max_blob_bytes: u64,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            inline_threshold_bytes: 64 * 1024,       // 64KB
            chunk_size_bytes: 8 * 1024 * 1024,       // 8MB
            max_blob_bytes: 5 * 1024 * 1024 * 1024,  // 5GB
        }
    }
}

impl BlobConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inline_threshold(mut self, bytes: usize) -> Self {
        self.inline_threshold_bytes = bytes;
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size_bytes = bytes;
        self
    }

    pub fn with_max_blob_bytes(mut self, bytes: u64) -> Self {
        self.max_blob_bytes = bytes;
        self
    }
}
