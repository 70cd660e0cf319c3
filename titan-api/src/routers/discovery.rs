//! `/lookup` - discovery endpoints over the repository indexes.

use axum::extract::{Query, RawQuery, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use titan_repo::AssetIdFilter;

use crate::error::ApiError;
use crate::params::{page_body, tenant_from_headers};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct LookupSubmodelsQuery {
    #[serde(rename = "semanticId")]
    semantic_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/lookup/shells", get(lookup_shells))
        .route("/lookup/submodels", get(lookup_submodels))
}

/// `assetIds` repeats, so the query string is split by hand; the values
/// are base64url and never percent-encoded.
fn asset_id_params(raw_query: Option<&str>) -> Vec<String> {
    raw_query
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| *key == "assetIds")
        .map(|(_, value)| value.to_string())
        .collect()
}

async fn lookup_shells(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let encoded_ids = asset_id_params(raw_query.as_deref());
    let mut filters = Vec::with_capacity(encoded_ids.len());
    for encoded in &encoded_ids {
        filters.push(AssetIdFilter::decode(encoded)?);
    }
    let ids = state.discovery.lookup_shells(&ctx, &filters).await?;
    Ok(Json(page_body(
        ids.into_iter().map(Value::String).collect(),
        None,
    )))
}

async fn lookup_submodels(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LookupSubmodelsQuery>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let ids = state
        .discovery
        .lookup_submodels(&ctx, &query.semantic_id)
        .await?;
    Ok(Json(page_body(
        ids.into_iter().map(Value::String).collect(),
        None,
    )))
}
