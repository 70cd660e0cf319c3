//! `/submodels` - Submodel repository, element operations, operation
//! invocation, template instantiation and attachment streaming.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::Value;

use titan_core::{decode_id, encode_id, EntityKind, TitanError};
use titan_model::validation::BLOB_REF_PREFIX;
use titan_model::{Submodel, SubmodelElement};
use titan_projection::{
    apply_projection, collect_paths, element_reference, extract_value, Content,
};
use titan_repo::{InstantiationRequest, InvokeRequest, ListFilter};

use crate::error::ApiError;
use crate::params::{
    conditional_bytes_response, created_response, if_match_from_headers, page_body, parse_doc,
    tenant_from_headers, updated_response, CachePolicy, ReadQuery,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/submodels", get(list_submodels).post(create_submodel))
        .route(
            "/submodels/{id}",
            get(get_submodel)
                .put(put_submodel)
                .patch(patch_submodel)
                .delete(delete_submodel),
        )
        .route("/submodels/{id}/instantiate", post(instantiate))
        .route(
            "/submodels/{id}/submodel-elements",
            get(get_elements_root).post(create_element_root),
        )
        .route(
            "/submodels/{id}/submodel-elements/{*path}",
            get(get_element)
                .put(put_element)
                .patch(patch_element)
                .post(post_element)
                .delete(delete_element),
        )
}

fn cache_policy(state: &AppState) -> CachePolicy {
    CachePolicy {
        max_age: state.settings.cache_max_age,
        stale_while_revalidate: state.settings.cache_stale_while_revalidate,
    }
}

async fn list_submodels(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let modifiers = query.modifiers()?;
    let filter = ListFilter {
        id_short: query.id_short.clone(),
        semantic_id: query.semantic_id.clone(),
    };
    let page = state
        .submodels
        .list(&ctx, query.cursor.as_deref(), query.limit, &filter)
        .await?;

    let mut items = Vec::with_capacity(page.items.len());
    for (doc_bytes, _) in &page.items {
        let doc = parse_doc(doc_bytes)?;
        items.push(apply_projection(&doc, &modifiers));
    }
    Ok(Json(page_body(items, page.next_cursor)))
}

async fn create_submodel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(submodel): Json<Submodel>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = submodel.id.clone();
    let (doc_bytes, etag) = state.submodels.create(&ctx, submodel).await?;
    let location = format!("/submodels/{}", encode_id(&id));
    Ok(created_response(&location, doc_bytes, &etag))
}

async fn get_submodel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let modifiers = query.modifiers()?;

    if modifiers.is_plain() {
        if let Ok(Some((doc_bytes, etag))) =
            state.cache.get_pair(EntityKind::Submodel, &id_b64).await
        {
            return Ok(conditional_bytes_response(
                &headers,
                doc_bytes,
                &etag,
                Some(cache_policy(&state)),
            ));
        }
        let (doc_bytes, etag) = state.submodels.get(&ctx, &id).await?;
        return Ok(conditional_bytes_response(
            &headers,
            doc_bytes,
            &etag,
            Some(cache_policy(&state)),
        ));
    }

    let doc = state.submodels.get_doc(&ctx, &id).await?;
    match modifiers.content {
        Content::Path => Ok(Json(Value::from(
            collect_paths(&doc, "")
                .into_iter()
                .map(Value::String)
                .collect::<Vec<_>>(),
        ))
        .into_response()),
        Content::Reference => Ok(Json(serde_json::json!({
            "type": "ModelReference",
            "keys": [{"type": "Submodel", "value": id}]
        }))
        .into_response()),
        _ => Ok(Json(apply_projection(&doc, &modifiers)).into_response()),
    }
}

async fn put_submodel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Json(submodel): Json<Submodel>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    let (doc_bytes, etag) = state.submodels.replace(&ctx, &id, submodel, &if_match).await?;
    Ok(updated_response(doc_bytes, &etag))
}

async fn patch_submodel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    let (doc_bytes, etag) = state.submodels.patch(&ctx, &id, &patch, &if_match).await?;
    Ok(updated_response(doc_bytes, &etag))
}

async fn delete_submodel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let if_match = if_match_from_headers(&headers);
    state.submodels.delete(&ctx, &id, &if_match).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn instantiate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Json(request): Json<InstantiationRequest>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let template_id = decode_id(&id_b64)?;
    let new_id = request.new_id.clone();
    let (doc_bytes, etag) = state
        .submodels
        .instantiate(&ctx, &template_id, &request)
        .await?;
    let location = format!("/submodels/{}", encode_id(&new_id));
    Ok(created_response(&location, doc_bytes, &etag))
}

// ---- submodel elements ----

async fn get_elements_root(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let modifiers = query.modifiers()?;
    let doc = state.submodels.get_doc(&ctx, &id).await?;

    let elements = doc
        .get("submodelElements")
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));
    let Value::Array(elements) = elements else {
        return Err(ApiError(TitanError::internal("submodelElements is not an array")));
    };

    let items: Vec<Value> = match modifiers.content {
        Content::Value => elements
            .iter()
            .map(|element| extract_value(element).unwrap_or(Value::Null))
            .collect(),
        Content::Path => collect_paths(&doc, "").into_iter().map(Value::String).collect(),
        _ => elements
            .iter()
            .map(|element| apply_projection(element, &modifiers))
            .collect(),
    };
    Ok(Json(page_body(items, None)).into_response())
}

async fn create_element_root(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id_b64): Path<String>,
    Json(element): Json<SubmodelElement>,
) -> Result<Response, ApiError> {
    create_element_common(state, headers, id_b64, String::new(), element).await
}

async fn post_element(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id_b64, raw_path)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    post_element_action(state, headers, id_b64, raw_path, body).await
}

async fn create_element_common(
    state: AppState,
    headers: HeaderMap,
    id_b64: String,
    parent_path: String,
    element: SubmodelElement,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let created = state
        .submodels
        .create_element(&ctx, &id, &parent_path, element)
        .await?;

    let location = format!(
        "/submodels/{id_b64}/submodel-elements/{}",
        created.id_short_path
    );
    let element_doc = state
        .submodels
        .get_element(&ctx, &id, &created.id_short_path)
        .await?;
    let body = serde_json::to_vec(&element_doc)
        .map_err(|e| ApiError(TitanError::internal_from("element serialization failed", e)))?;
    Ok(created_response(&location, body, &created.etag))
}

/// Element paths may carry a trailing action segment (`$value`, `invoke`,
/// `attachment`, `operation-status/{id}`); split it off the idShortPath.
fn split_action(path: &str) -> (String, Option<String>) {
    for action in ["$value", "invoke", "attachment"] {
        if let Some(prefix) = path.strip_suffix(&format!("/{action}")) {
            return (prefix.to_string(), Some(action.to_string()));
        }
    }
    if let Some((prefix, rest)) = path.rsplit_once("/operation-status/") {
        return (
            prefix.to_string(),
            Some(format!("operation-status/{rest}")),
        );
    }
    (path.to_string(), None)
}

async fn get_element(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id_b64, raw_path)): Path<(String, String)>,
    Query(query): Query<ReadQuery>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let (path, action) = split_action(&raw_path);

    match action.as_deref() {
        None => {
            let modifiers = query.modifiers()?;

            if modifiers.content == Content::Value {
                // element-value cache is the hot path for $value reads
                if let Ok(Some(value_bytes)) =
                    state.cache.get_element_value(&id_b64, &path).await
                {
                    return Ok((
                        StatusCode::OK,
                        [("content-type", "application/json")],
                        value_bytes,
                    )
                        .into_response());
                }
            }

            let element = state.submodels.get_element(&ctx, &id, &path).await?;
            let body = match modifiers.content {
                Content::Value => extract_value(&element).unwrap_or(Value::Null),
                Content::Reference => element_reference(&id, &path, &element),
                Content::Path => Value::from(
                    collect_paths(&element, &path)
                        .into_iter()
                        .map(Value::String)
                        .collect::<Vec<_>>(),
                ),
                _ => apply_projection(&element, &modifiers),
            };
            Ok(Json(body).into_response())
        }
        Some(action) if action == "attachment" => {
            stream_attachment(&state, &ctx, &id, &path).await
        }
        Some(action) if action.starts_with("operation-status/") => {
            let invocation_id = action.trim_start_matches("operation-status/");
            let invocation = state.invocations.get(&ctx, invocation_id).await?;
            Ok(Json(serde_json::to_value(invocation).map_err(|e| {
                ApiError(TitanError::internal_from("invocation serialization failed", e))
            })?)
            .into_response())
        }
        Some(other) => Err(ApiError::bad_request(format!(
            "unsupported read action '{other}'"
        ))),
    }
}

async fn put_element(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id_b64, raw_path)): Path<(String, String)>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let (path, action) = split_action(&raw_path);

    match action.as_deref() {
        None => {
            let element: SubmodelElement = serde_json::from_slice(&body)
                .map_err(|e| ApiError::bad_request(format!("invalid submodel element: {e}")))?;
            let (doc_bytes, etag) = state
                .submodels
                .replace_element(&ctx, &id, &path, element)
                .await?;
            Ok(updated_response(doc_bytes, &etag))
        }
        Some(action) if action == "attachment" => {
            upload_attachment(&state, &ctx, &headers, &id, &path, body).await
        }
        Some(other) => Err(ApiError::bad_request(format!(
            "unsupported write action '{other}'"
        ))),
    }
}

async fn patch_element(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id_b64, raw_path)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let (path, action) = split_action(&raw_path);

    let (doc_bytes, etag) = match action.as_deref() {
        None => state.submodels.patch_element(&ctx, &id, &path, &body).await?,
        Some("$value") => {
            state
                .submodels
                .patch_element_value(&ctx, &id, &path, &body)
                .await?
        }
        Some(other) => {
            return Err(ApiError::bad_request(format!(
                "unsupported patch action '{other}'"
            )))
        }
    };
    Ok(updated_response(doc_bytes, &etag))
}

async fn delete_element(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id_b64, raw_path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let (path, action) = split_action(&raw_path);
    if action.is_some() {
        return Err(ApiError::bad_request("unsupported delete action"));
    }
    state.submodels.delete_element(&ctx, &id, &path).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

// POST on an element path is either `invoke` or nested element creation
async fn post_element_action(
    state: AppState,
    headers: HeaderMap,
    id_b64: String,
    raw_path: String,
    body: Bytes,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let id = decode_id(&id_b64)?;
    let (path, action) = split_action(&raw_path);

    match action.as_deref() {
        Some("invoke") => {
            let request: InvokeRequest = if body.is_empty() {
                InvokeRequest::default()
            } else {
                serde_json::from_slice(&body)
                    .map_err(|e| ApiError::bad_request(format!("invalid invoke request: {e}")))?
            };
            let operation = state.submodels.get_element(&ctx, &id, &path).await?;
            let invocation = state
                .invocations
                .invoke(&ctx, &id, &path, &operation, request)
                .await?;
            Ok(Json(serde_json::to_value(invocation).map_err(|e| {
                ApiError(TitanError::internal_from("invocation serialization failed", e))
            })?)
            .into_response())
        }
        None => {
            let element: SubmodelElement = serde_json::from_slice(&body)
                .map_err(|e| ApiError::bad_request(format!("invalid submodel element: {e}")))?;
            create_element_common(state, headers, id_b64, path, element).await
        }
        Some(other) => Err(ApiError::bad_request(format!(
            "unsupported post action '{other}'"
        ))),
    }
}

async fn stream_attachment(
    state: &AppState,
    ctx: &titan_core::TenantContext,
    submodel_id: &str,
    path: &str,
) -> Result<Response, ApiError> {
    let element = state.submodels.get_element(ctx, submodel_id, path).await?;
    let value = element.get("value").and_then(Value::as_str).unwrap_or("");

    let Some(blob_id) = value.strip_prefix(BLOB_REF_PREFIX) else {
        // still inline: decode and return directly
        let content = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            value.as_bytes(),
        )
        .map_err(|_| ApiError::not_found("element carries no attachment content"))?;
        let content_type = element
            .get("contentType")
            .and_then(Value::as_str)
            .unwrap_or("application/octet-stream")
            .to_string();
        return Ok((StatusCode::OK, [("content-type", content_type)], content).into_response());
    };

    let row = state
        .store
        .get_blob_row(ctx, blob_id)
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
        axum::http::HeaderValue::from_str(&row.content_type)
            .unwrap_or_else(|_| axum::http::HeaderValue::from_static("application/octet-stream")),
    );
    Ok(response)
}

async fn upload_attachment(
    state: &AppState,
    ctx: &titan_core::TenantContext,
    headers: &HeaderMap,
    submodel_id: &str,
    path: &str,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    // rewrite the element value as inline base64; the repository's
    // externalizer moves it to the blob store on persist
    let encoded =
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &body);
    let element = state.submodels.get_element(ctx, submodel_id, path).await?;
    let model_type = element.get("modelType").and_then(Value::as_str);
    if !matches!(model_type, Some("Blob") | Some("File")) {
        return Err(ApiError::bad_request(
            "attachments are only supported on Blob and File elements",
        ));
    }

    let patch = serde_json::json!({"value": encoded, "contentType": content_type});
    let (doc_bytes, etag) = state
        .submodels
        .patch_element(ctx, submodel_id, path, &patch)
        .await?;
    Ok(updated_response(doc_bytes, &etag))
}
