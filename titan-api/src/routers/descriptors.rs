//! `/shell-descriptors` and `/submodel-descriptors` - registry endpoints.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use titan_core::{decode_id, encode_id};
use titan_model::{AssetAdministrationShellDescriptor, SubmodelDescriptor};

use crate::error::ApiError;
use crate::params::{
    conditional_bytes_response, created_response, if_match_from_headers, page_body, parse_doc,
    tenant_from_headers, updated_response, ReadQuery,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/shell-descriptors",
            get(list_shell_descriptors).post(create_shell_descriptor),
        )
        .route(
            "/shell-descriptors/{id}",
            get(get_shell_descriptor)
                .put(put_shell_descriptor)
                .delete(delete_shell_descriptor),
        )
        .route(
            "/submodel-descriptors",
            get(list_submodel_descriptors).post(create_submodel_descriptor),
        )
        .route(
            "/submodel-descriptors/{id}",
            get(get_submodel_descriptor)
                .put(put_submodel_descriptor)
                .delete(delete_submodel_descriptor),
        )
}

async fn list_shell_descriptors(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let page = state
        .descriptors
        .list_shell_descriptors(&ctx, query.cursor.as_deref(), query.limit)
        .await?;
    let mut items = Vec::with_capacity(page.items.len());
    for (doc_bytes, _) in &page.items {
        items.push(parse_doc(doc_bytes)?);
    }
    Ok(Json(page_body(items, page.next_cursor)))
}

async fn create_shell_descriptor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(descriptor): Json<AssetAdministrationShellDescriptor>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = descriptor.id.clone();
    let (doc_bytes, etag) = state
        .descriptors
        .create_shell_descriptor(&ctx, descriptor)
        .await?;
    let location = format!("/shell-descriptors/{}", encode_id(&id));
    Ok(created_response(&location, doc_bytes, &etag))
}

async fn get_shell_descriptor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let (doc_bytes, etag) = state.descriptors.get_shell_descriptor(&ctx, &id).await?;
    Ok(conditional_bytes_response(&headers, doc_bytes, &etag, None))
}

async fn put_shell_descriptor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Json(descriptor): Json<AssetAdministrationShellDescriptor>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    let (doc_bytes, etag) = state
        .descriptors
        .replace_shell_descriptor(&ctx, &id, descriptor, &if_match)
        .await?;
    Ok(updated_response(doc_bytes, &etag))
}

async fn delete_shell_descriptor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    state
        .descriptors
        .delete_shell_descriptor(&ctx, &id, &if_match)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn list_submodel_descriptors(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let page = state
        .descriptors
        .list_submodel_descriptors(
            &ctx,
            query.cursor.as_deref(),
            query.limit,
            query.semantic_id.as_deref(),
        )
        .await?;
    let mut items = Vec::with_capacity(page.items.len());
    for (doc_bytes, _) in &page.items {
        items.push(parse_doc(doc_bytes)?);
    }
    Ok(Json(page_body(items, page.next_cursor)))
}

async fn create_submodel_descriptor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(descriptor): Json<SubmodelDescriptor>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = descriptor.id.clone();
    let (doc_bytes, etag) = state
        .descriptors
        .create_submodel_descriptor(&ctx, descriptor)
        .await?;
    let location = format!("/submodel-descriptors/{}", encode_id(&id));
    Ok(created_response(&location, doc_bytes, &etag))
}

async fn get_submodel_descriptor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let (doc_bytes, etag) = state.descriptors.get_submodel_descriptor(&ctx, &id).await?;
    Ok(conditional_bytes_response(&headers, doc_bytes, &etag, None))
}

async fn put_submodel_descriptor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Json(descriptor): Json<SubmodelDescriptor>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    let (doc_bytes, etag) = state
        .descriptors
        .replace_submodel_descriptor(&ctx, &id, descriptor, &if_match)
        .await?;
    Ok(updated_response(doc_bytes, &etag))
}

async fn delete_submodel_descriptor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    state
        .descriptors
        .delete_submodel_descriptor(&ctx, &id, &if_match)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
