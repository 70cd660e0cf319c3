use thiserror::Error;

use titan_core::TitanError;

/// Validation and parse errors raised by the metamodel layer.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("unknown modelType: {0}")]
    UnknownModelType(String),

    #[error("invalid idShort '{id_short}': {reason}")]
    InvalidIdShort { id_short: String, reason: String },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl ModelError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<ModelError> for TitanError {
    fn from(err: ModelError) -> Self {
        TitanError::bad_request(err.to_string())
    }
}
