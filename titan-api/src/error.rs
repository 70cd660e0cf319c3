//! The IDTA `Result` envelope.
//!
//! Every failed response carries a single message with a stable code, a
//! human text and an RFC3339 timestamp. Internal errors never leak their
//! source chain to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::error;

use titan_core::TitanError;

#[derive(Debug)]
pub struct ApiError(pub TitanError);

impl From<TitanError> for ApiError {
    fn from(err: TitanError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self(TitanError::not_found(message))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(TitanError::bad_request(message))
    }

    /// The envelope body for this error.
    pub fn envelope(&self) -> serde_json::Value {
        json!({
            "messages": [{
                "code": self.0.code(),
                "messageType": self.0.message_type(),
                "text": self.0.client_text(),
                "timestamp": Utc::now().to_rfc3339(),
            }]
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self.0, TitanError::Internal { .. }) {
            error!(error = %self.0, "internal error");
        }
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.envelope())).into_response();
        if let TitanError::TooManyRequests { .. } = self.0 {
            response
                .headers_mut()
                .insert("Retry-After", axum::http::HeaderValue::from_static("60"));
        }
        response
    }
}
