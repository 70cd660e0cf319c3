//! Query and header plumbing shared by the routers.

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH, LOCATION};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use titan_core::{strong_etag, TenantContext};
use titan_projection::ProjectionModifiers;
use titan_repo::IfMatch;

use crate::error::ApiError;

/// Query parameters understood by the read endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadQuery {
    pub level: Option<String>,
    pub extent: Option<String>,
    pub content: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<usize>,
    #[serde(rename = "idShort")]
    pub id_short: Option<String>,
    #[serde(rename = "semanticId")]
    pub semantic_id: Option<String>,
}

impl ReadQuery {
    pub fn modifiers(&self) -> Result<ProjectionModifiers, ApiError> {
        ProjectionModifiers::parse(
            self.level.as_deref(),
            self.extent.as_deref(),
            self.content.as_deref(),
        )
        .map_err(|e| ApiError(e.into()))
    }
}

/// Tenant selection: explicit header, else the default partition.
pub fn tenant_from_headers(headers: &HeaderMap) -> TenantContext {
    let ctx = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .map(TenantContext::new)
        .unwrap_or_default();
    match headers
        .get("x-auth-subject")
        .and_then(|v| v.to_str().ok())
    {
        Some(subject) => ctx.with_subject(subject),
        None => ctx,
    }
}

pub fn if_match_from_headers(headers: &HeaderMap) -> IfMatch {
    IfMatch::parse(headers.get(IF_MATCH).and_then(|v| v.to_str().ok()))
}

fn if_none_match(headers: &HeaderMap) -> Option<String> {
    headers
        .get(IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|raw| raw.trim_matches('"').to_string())
}

fn etag_header(etag: &str) -> HeaderValue {
    HeaderValue::from_str(&strong_etag(etag))
        .unwrap_or_else(|_| HeaderValue::from_static("\"invalid\""))
}

/// Cache directives advertised on cacheable GETs.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub max_age: u32,
    pub stale_while_revalidate: u32,
}

/// 200 with canonical bytes, or 304 when `If-None-Match` hits.
pub fn conditional_bytes_response(
    headers: &HeaderMap,
    doc_bytes: Vec<u8>,
    etag: &str,
    cache: Option<CachePolicy>,
) -> Response {
    if if_none_match(headers).as_deref() == Some(etag) {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        response.headers_mut().insert(ETAG, etag_header(etag));
        return response;
    }

    let mut response = (StatusCode::OK, doc_bytes).into_response();
    let response_headers = response.headers_mut();
    response_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response_headers.insert(ETAG, etag_header(etag));
    if let Some(cache) = cache {
        if let Ok(value) = HeaderValue::from_str(&format!(
            "max-age={}, stale-while-revalidate={}",
            cache.max_age, cache.stale_while_revalidate
        )) {
            response_headers.insert(CACHE_CONTROL, value);
        }
    }
    response
}

/// 201 with `Location` and `ETag`.
pub fn created_response(location: &str, doc_bytes: Vec<u8>, etag: &str) -> Response {
    let mut response = (StatusCode::CREATED, doc_bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ETAG, etag_header(etag));
    if let Ok(value) = HeaderValue::from_str(location) {
        headers.insert(LOCATION, value);
    }
    response
}

/// 200 with fresh bytes and ETag after a mutation.
pub fn updated_response(doc_bytes: Vec<u8>, etag: &str) -> Response {
    let mut response = (StatusCode::OK, doc_bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ETAG, etag_header(etag));
    response
}

/// Paged listing body: `{result: […], paging_metadata: {cursor}}`.
pub fn page_body(items: Vec<serde_json::Value>, next_cursor: Option<String>) -> serde_json::Value {
    let mut paging = serde_json::Map::new();
    if let Some(cursor) = next_cursor {
        paging.insert("cursor".to_string(), serde_json::Value::String(cursor));
    }
    serde_json::json!({"result": items, "paging_metadata": paging})
}

/// Parse stored canonical bytes back into a document for projection.
pub fn parse_doc(doc_bytes: &[u8]) -> Result<serde_json::Value, ApiError> {
    serde_json::from_slice(doc_bytes).map_err(|e| {
        ApiError(titan_core::TitanError::internal_from(
            "stored canonical bytes failed to parse",
            e,
        ))
    })
}
