use thiserror::Error;

use titan_core::TitanError;

/// Errors raised while parsing paths or applying modifiers.
#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("invalid idShortPath '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid modifier value '{value}' for {parameter}")]
    InvalidModifier { parameter: String, value: String },
}

impl ProjectionError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_modifier(parameter: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidModifier {
            parameter: parameter.into(),
            value: value.into(),
        }
    }
}

impl From<ProjectionError> for TitanError {
    fn from(err: ProjectionError) -> Self {
        TitanError::bad_request(err.to_string())
    }
}
