//! `/concept-descriptions` - Concept Description repository endpoints.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use titan_core::{decode_id, encode_id, EntityKind};
use titan_model::ConceptDescription;
use titan_repo::ListFilter;

use crate::error::ApiError;
use crate::params::{
    conditional_bytes_response, created_response, if_match_from_headers, page_body, parse_doc,
    tenant_from_headers, updated_response, CachePolicy, ReadQuery,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/concept-descriptions",
            get(list_concept_descriptions).post(create_concept_description),
        )
        .route(
            "/concept-descriptions/{id}",
            get(get_concept_description)
                .put(put_concept_description)
                .patch(patch_concept_description)
                .delete(delete_concept_description),
        )
}

async fn list_concept_descriptions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let filter = ListFilter {
        id_short: query.id_short.clone(),
        ..ListFilter::default()
    };
    let page = state
        .concept_descriptions
        .list(&ctx, query.cursor.as_deref(), query.limit, &filter)
        .await?;

    let mut items = Vec::with_capacity(page.items.len());
    for (doc_bytes, _) in &page.items {
        items.push(parse_doc(doc_bytes)?);
    }
    Ok(Json(page_body(items, page.next_cursor)))
}

async fn create_concept_description(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(cd): Json<ConceptDescription>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = cd.id.clone();
    let (doc_bytes, etag) = state.concept_descriptions.create(&ctx, cd).await?;
    let location = format!("/concept-descriptions/{}", encode_id(&id));
    Ok(created_response(&location, doc_bytes, &etag))
}

async fn get_concept_description(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;

    let cache_policy = CachePolicy {
        max_age: state.settings.cache_max_age,
        stale_while_revalidate: state.settings.cache_stale_while_revalidate,
    };
    if let Ok(Some((doc_bytes, etag))) = state
        .cache
        .get_pair(EntityKind::ConceptDescription, &id_b64)
        .await
    {
        return Ok(conditional_bytes_response(
            &headers,
            doc_bytes,
            &etag,
            Some(cache_policy),
        ));
    }

    let (doc_bytes, etag) = state.concept_descriptions.get(&ctx, &id).await?;
    Ok(conditional_bytes_response(
        &headers,
        doc_bytes,
        &etag,
        Some(cache_policy),
    ))
}

async fn put_concept_description(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Json(cd): Json<ConceptDescription>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    let (doc_bytes, etag) = state
        .concept_descriptions
        .replace(&ctx, &id, cd, &if_match)
        .await?;
    Ok(updated_response(doc_bytes, &etag))
}

async fn patch_concept_description(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    let (doc_bytes, etag) = state
        .concept_descriptions
        .patch(&ctx, &id, &patch, &if_match)
        .await?;
    Ok(updated_response(doc_bytes, &etag))
}

async fn delete_concept_description(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    state
        .concept_descriptions
        .delete(&ctx, &id, &if_match)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
