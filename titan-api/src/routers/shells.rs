//! `/shells` - Asset Administration Shell repository endpoints.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use titan_core::{decode_id, EntityKind};
use titan_model::AssetAdministrationShell;
use titan_projection::{apply_projection, Content};
use titan_repo::ListFilter;

use crate::error::ApiError;
use crate::params::{
    conditional_bytes_response, created_response, if_match_from_headers, page_body, parse_doc,
    tenant_from_headers, updated_response, CachePolicy, ReadQuery,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/shells", get(list_shells).post(create_shell))
        .route(
            "/shells/{id}",
            get(get_shell)
                .put(put_shell)
                .patch(patch_shell)
                .delete(delete_shell),
        )
}

fn cache_policy(state: &AppState) -> CachePolicy {
    CachePolicy {
        max_age: state.settings.cache_max_age,
        stale_while_revalidate: state.settings.cache_stale_while_revalidate,
    }
}

async fn list_shells(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let modifiers = query.modifiers()?;
    let filter = ListFilter {
        id_short: query.id_short.clone(),
        ..ListFilter::default()
    };
    let page = state
        .shells
        .list(&ctx, query.cursor.as_deref(), query.limit, &filter)
        .await?;

    let mut items = Vec::with_capacity(page.items.len());
    for (doc_bytes, _) in &page.items {
        let doc = parse_doc(doc_bytes)?;
        items.push(apply_projection(&doc, &modifiers));
    }
    Ok(Json(page_body(items, page.next_cursor)))
}

async fn create_shell(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(shell): Json<AssetAdministrationShell>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = shell.id.clone();
    let (doc_bytes, etag) = state.shells.create(&ctx, shell).await?;
    let location = format!("/shells/{}", titan_core::encode_id(&id));
    Ok(created_response(&location, doc_bytes, &etag))
}

async fn get_shell(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let modifiers = query.modifiers()?;

    // fast path: cached pair, conditional check, no projection needed
    if modifiers.is_plain() {
        if let Ok(Some((doc_bytes, etag))) =
            state.cache.get_pair(EntityKind::Aas, &id_b64).await
        {
            return Ok(conditional_bytes_response(
                &headers,
                doc_bytes,
                &etag,
                Some(cache_policy(&state)),
            ));
        }
        let (doc_bytes, etag) = state.shells.get(&ctx, &id).await?;
        return Ok(conditional_bytes_response(
            &headers,
            doc_bytes,
            &etag,
            Some(cache_policy(&state)),
        ));
    }

    if modifiers.content == Content::Reference {
        return Ok(Json(serde_json::json!({
            "type": "ModelReference",
            "keys": [{"type": "AssetAdministrationShell", "value": id}]
        }))
        .into_response());
    }

    let doc = state.shells.get_doc(&ctx, &id).await?;
    Ok(Json(apply_projection(&doc, &modifiers)).into_response())
}

async fn put_shell(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Json(shell): Json<AssetAdministrationShell>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    let (doc_bytes, etag) = state.shells.replace(&ctx, &id, shell, &if_match).await?;
    Ok(updated_response(doc_bytes, &etag))
}

async fn patch_shell(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    let (doc_bytes, etag) = state.shells.patch(&ctx, &id, &patch, &if_match).await?;
    Ok(updated_response(doc_bytes, &etag))
}

async fn delete_shell(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    state.shells.delete(&ctx, &id, &if_match).await?;
    Ok(axum::http::StatusCode::NO_CONTENT.into_response())
}
