use thiserror::Error;

use titan_core::TitanError;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob operations
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob not found: {id}")]
    NotFound { id: String },

    #[error("invalid blob content: {message}")]
    Invalid { message: String },

    #[error("storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(id: S) -> Self {
        Self::NotFound { id: id.into() }
    }
}

impl From<BlobError> for TitanError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound { id } => TitanError::not_found(format!("blob {id} not found")),
            BlobError::Invalid { message } => TitanError::bad_request(message),
            other => TitanError::internal_from("blob storage failure", other),
        }
    }
}
