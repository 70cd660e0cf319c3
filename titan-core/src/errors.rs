//! Structured errors for Titan-AAS.
//!
//! Every failure that can cross the HTTP boundary maps onto a stable IDTA
//! error code plus an HTTP status. Infrastructure errors (cache, blob
//! backends, bus) are wrapped as `Internal` before they reach a client so
//! backend detail never leaks.

use thiserror::Error;

/// A convenience result type for Titan core APIs.
pub type TitanResult<T> = Result<T, TitanError>;

/// Error taxonomy shared by all Titan crates.
#[derive(Error, Debug)]
pub enum TitanError {
    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("invalid base64url identifier: {message}")]
    InvalidBase64Url { message: String },

    #[error("precondition failed: {message}")]
    PreconditionFailed { message: String },

    #[error("too many requests: {message}")]
    TooManyRequests { message: String },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TitanError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into() }
    }

    pub fn invalid_base64url(message: impl Into<String>) -> Self {
        Self::InvalidBase64Url { message: message.into() }
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed { message: message.into() }
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::TooManyRequests { message: message.into() }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Wrap any error as an internal error, keeping it as source for logs.
    pub fn internal_from<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// HTTP status code for this error (spec taxonomy).
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::BadRequest { .. } => 400,
            Self::InvalidBase64Url { .. } => 400,
            Self::PreconditionFailed { .. } => 412,
            Self::TooManyRequests { .. } => 429,
            Self::Unauthorized { .. } => 401,
            Self::Forbidden { .. } => 403,
            Self::Internal { .. } => 500,
        }
    }

    /// Stable IDTA error code carried in the `Result` envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NotFound",
            Self::Conflict { .. } => "Conflict",
            Self::BadRequest { .. } => "BadRequest",
            Self::InvalidBase64Url { .. } => "InvalidBase64Url",
            Self::PreconditionFailed { .. } => "PreconditionFailed",
            Self::TooManyRequests { .. } => "TooManyRequests",
            Self::Unauthorized { .. } => "Unauthorized",
            Self::Forbidden { .. } => "Forbidden",
            Self::Internal { .. } => "InternalServerError",
        }
    }

    /// IDTA messageType: internal failures report as `Exception`,
    /// everything else as `Error`.
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Internal { .. } => "Exception",
            _ => "Error",
        }
    }

    /// Human text safe to return to clients. Internal errors keep a generic
    /// message; the source stays in logs only.
    pub fn client_text(&self) -> String {
        match self {
            Self::Internal { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(TitanError::not_found("x").status_code(), 404);
        assert_eq!(TitanError::conflict("x").status_code(), 409);
        assert_eq!(TitanError::invalid_base64url("x").status_code(), 400);
        assert_eq!(TitanError::precondition_failed("x").status_code(), 412);
        assert_eq!(TitanError::too_many_requests("x").status_code(), 429);
        assert_eq!(TitanError::internal("x").status_code(), 500);
    }

    #[test]
    fn internal_reports_as_exception() {
        assert_eq!(TitanError::internal("boom").message_type(), "Exception");
        assert_eq!(TitanError::not_found("gone").message_type(), "Error");
        assert_eq!(TitanError::internal("boom").code(), "InternalServerError");
    }
}
