//! `/blobs/{blob_id}` - direct blob content access.
//!
//! The `/blobs/{uuid}` reference format stored in element values resolves
//! here; GET streams the bytes, PUT replaces the content in place while
//! keeping the same blob id.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;

use titan_core::TitanError;

use crate::error::ApiError;
use crate::params::tenant_from_headers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/blobs/{blob_id}", get(get_blob).put(put_blob))
}

async fn get_blob(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(blob_id): Path<String>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let row = state
        .store
        .get_blob_row(&ctx, &blob_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("blob '{blob_id}' not found")))?;

    let stream = state
        .blob_store
        .stream(&row)
        .await
        .map_err(TitanError::from)?;

    let mut response = Response::new(Body::from_stream(stream));
    response.headers_mut().insert(
        "content-type",
        HeaderValue::from_str(&row.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    response.headers_mut().insert(
        "content-length",
        HeaderValue::from_str(&row.size_bytes.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    Ok(response)
}

async fn put_blob(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(blob_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let row = state
        .store
        .get_blob_row(&ctx, &blob_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("blob '{blob_id}' not found")))?;
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(&row.content_type)
        .to_string();

    // rewrite through the element so the submodel document, blob row and
    // stored bytes change together
    let (submodel_id, path) = (row.submodel_id.clone(), row.id_short_path.clone());
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &body);
    let patch = serde_json::json!({"value": encoded, "contentType": content_type});
    state
        .submodels
        .patch_element(&ctx, &submodel_id, &path, &patch)
        .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}
