//! # titan-blob
//!
//! Streaming blob storage for Titan-AAS. Large inline `Blob`/`File`
//! payloads are extracted on write into an object store and replaced by
//! opaque `/blobs/{uuid}` references; reads stream the bytes back in
//! bounded chunks.
//!
//! The [`store::BlobStore`] trait is the backend seam. Two backends ship:
//! a sharded local filesystem store and an S3-compatible store (any
//! endpoint speaking the S3 API, including GCS interop). The
//! [`externalize`] module walks submodel documents and performs the
//! inline-to-reference rewrite.

pub mod config;
pub mod error;
pub mod externalize;
pub mod local;
pub mod s3;
pub mod store;
pub mod types;

pub use config::BlobConfig;
pub use error::{BlobError, BlobResult};
pub use externalize::{externalize_submodel_doc, ExternalizationResult, BLOB_REF_PREFIX};
pub use local::LocalBlobStore;
pub use s3::S3CompatibleStore;
pub use store::BlobStore;
pub use types::{BlobId, BlobMetadata, ByteStream};
