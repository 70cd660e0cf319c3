//! `/serialization` - bulk environment export and import.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use titan_repo::ListFilter;

use crate::error::ApiError;
use crate::params::{parse_doc, tenant_from_headers};
use crate::state::AppState;

const EXPORT_LIMIT: usize = 1000;

pub fn router() -> Router<AppState> {
    Router::new().route("/serialization", get(export_environment).post(import_environment))
}

/// Export the full environment as one document.
async fn export_environment(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let filter = ListFilter::default();

    let mut shells = Vec::new();
    let mut cursor = None;
    loop {
        let page = state
            .shells
            .list(&ctx, cursor.as_deref(), Some(EXPORT_LIMIT), &filter)
            .await?;
        for (doc_bytes, _) in &page.items {
            shells.push(parse_doc(doc_bytes)?);
        }
        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }

    let mut submodels = Vec::new();
    let mut cursor = None;
    loop {
        let page = state
            .submodels
            .list(&ctx, cursor.as_deref(), Some(EXPORT_LIMIT), &filter)
            .await?;
        for (doc_bytes, _) in &page.items {
            submodels.push(parse_doc(doc_bytes)?);
        }
        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }

    let mut concept_descriptions = Vec::new();
    let mut cursor = None;
    loop {
        let page = state
            .concept_descriptions
            .list(&ctx, cursor.as_deref(), Some(EXPORT_LIMIT), &filter)
            .await?;
        for (doc_bytes, _) in &page.items {
            concept_descriptions.push(parse_doc(doc_bytes)?);
        }
        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }

    Ok(Json(json!({
        "assetAdministrationShells": shells,
        "submodels": submodels,
        "conceptDescriptions": concept_descriptions,
    })))
}

/// Import an environment document; each entity commits independently and
/// failures are reported per entity.
async fn import_environment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(environment): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let mut imported = 0usize;
    let mut failures: Vec<Value> = Vec::new();

    for doc in array_of(&environment, "assetAdministrationShells") {
        match serde_json::from_value(doc.clone()) {
            Ok(shell) => match state.shells.create(&ctx, shell).await {
                Ok(_) => imported += 1,
                Err(error) => failures.push(failure("aas", doc, &error.to_string())),
            },
            Err(error) => failures.push(failure("aas", doc, &error.to_string())),
        }
    }

    for doc in array_of(&environment, "submodels") {
        match serde_json::from_value(doc.clone()) {
            Ok(submodel) => match state.submodels.create(&ctx, submodel).await {
                Ok(_) => imported += 1,
                Err(error) => failures.push(failure("submodel", doc, &error.to_string())),
            },
            Err(error) => failures.push(failure("submodel", doc, &error.to_string())),
        }
    }

    for doc in array_of(&environment, "conceptDescriptions") {
        match serde_json::from_value(doc.clone()) {
            Ok(cd) => match state.concept_descriptions.create(&ctx, cd).await {
                Ok(_) => imported += 1,
                Err(error) => failures.push(failure("cd", doc, &error.to_string())),
            },
            Err(error) => failures.push(failure("cd", doc, &error.to_string())),
        }
    }

    Ok(Json(json!({
        "imported": imported,
        "failed": failures.len(),
        "failures": failures,
    })))
}

fn array_of<'a>(environment: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    environment
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter())
        .into_iter()
        .flatten()
}

fn failure(entity: &str, doc: &Value, reason: &str) -> Value {
    json!({
        "entity": entity,
        "id": doc.get("id").cloned().unwrap_or(Value::Null),
        "reason": reason,
    })
}
