//! Externalize large Blob/File content into the blob store.
//!
//! Walks every `Blob` and `File` element of a submodel document,
//! including elements nested inside collections, lists, annotations,
//! entity statements and operation variables. Inline content above the
//! store's threshold is written to the backend and replaced by an opaque
//! `/blobs/{id}` reference; references already present are recorded so the
//! repository can keep their rows alive.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::error::BlobResult;
use crate::store::BlobStore;
use crate::types::BlobMetadata;

/// Prefix of internal blob references stored in element values.
pub const BLOB_REF_PREFIX: &str = "/blobs/";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Result of externalizing a submodel document.
#[derive(Debug, Default)]
pub struct ExternalizationResult {
    /// Metadata for content stored during this pass.
    pub new_blobs: Vec<BlobMetadata>,
    /// `(blob_id, id_short_path)` for references that were already present.
    pub referenced: Vec<(String, String)>,
}

fn blob_ref_id(value: &str) -> Option<&str> {
    value.strip_prefix(BLOB_REF_PREFIX)
}

/// Extract bytes and content type from a `data:…;base64,…` URI.
fn extract_data_uri(value: &str) -> Option<(Vec<u8>, String)> {
    let rest = value.strip_prefix("data:")?;
    let (header, body) = rest.split_once(";base64,")?;
    let content_type = if header.is_empty() {
        DEFAULT_CONTENT_TYPE.to_string()
    } else {
        header.to_string()
    };
    let bytes = STANDARD.decode(body).ok()?;
    Some((bytes, content_type))
}

fn child_path(parent: &str, id_short: Option<&str>, index: Option<usize>) -> String {
    if let Some(index) = index {
        return format!("{parent}[{index}]");
    }
    match (parent.is_empty(), id_short) {
        (_, None) => parent.to_string(),
        (true, Some(id_short)) => id_short.to_string(),
        (false, Some(id_short)) => format!("{parent}.{id_short}"),
    }
}

/// Externalize large Blob/File content in a Submodel document.
///
/// Mutates the document in place and returns metadata for stored blobs
/// plus the ids of references that were already externalized.
pub async fn externalize_submodel_doc(
    doc: &mut Value,
    submodel_id: &str,
    store: &dyn BlobStore,
) -> BlobResult<ExternalizationResult> {
    let mut result = ExternalizationResult::default();
    if let Some(elements) = doc.get_mut("submodelElements").and_then(Value::as_array_mut) {
        externalize_elements(elements, String::new(), false, submodel_id, store, &mut result)
            .await?;
    }
    Ok(result)
}

async fn externalize_elements(
    elements: &mut [Value],
    parent_path: String,
    parent_is_list: bool,
    submodel_id: &str,
    store: &dyn BlobStore,
    result: &mut ExternalizationResult,
) -> BlobResult<()> {
    for (index, element) in elements.iter_mut().enumerate() {
        let id_short = element
            .get("idShort")
            .and_then(Value::as_str)
            .map(str::to_string);
        let element_path = child_path(
            &parent_path,
            id_short.as_deref(),
            parent_is_list.then_some(index),
        );
        externalize_one(element, element_path, submodel_id, store, result).await?;
    }
    Ok(())
}

fn externalize_one<'a>(
    element: &'a mut Value,
    element_path: String,
    submodel_id: &'a str,
    store: &'a dyn BlobStore,
    result: &'a mut ExternalizationResult,
) -> BoxFuture<'a, BlobResult<()>> {
    async move {
        let model_type = element
            .get("modelType")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match model_type.as_str() {
            "Blob" => {
                externalize_blob(element, &element_path, submodel_id, store, result).await?;
            }
            "File" => {
                externalize_file(element, &element_path, submodel_id, store, result).await?;
            }
            _ => {}
        }

        let is_list = model_type == "SubmodelElementList";
        if model_type == "SubmodelElementCollection" || is_list {
            if let Some(children) = element.get_mut("value").and_then(Value::as_array_mut) {
                externalize_elements(
                    children,
                    element_path.clone(),
                    is_list,
                    submodel_id,
                    store,
                    result,
                )
                .await?;
            }
        }

        for nested_key in ["annotations", "statements"] {
            if let Some(children) = element.get_mut(nested_key).and_then(Value::as_array_mut) {
                externalize_elements(
                    children,
                    element_path.clone(),
                    false,
                    submodel_id,
                    store,
                    result,
                )
                .await?;
            }
        }

        // operation variables host one element each under "value",
        // addressed as `<op>.inputVariables[i]`
        for var_key in ["inputVariables", "outputVariables", "inoutputVariables"] {
            let Some(variables) = element.get_mut(var_key).and_then(Value::as_array_mut) else {
                continue;
            };
            let var_base = child_path(&element_path, Some(var_key), None);
            for (var_index, variable) in variables.iter_mut().enumerate() {
                let Some(hosted) = variable.get_mut("value") else { continue };
                if hosted.is_object() {
                    externalize_one(
                        hosted,
                        format!("{var_base}[{var_index}]"),
                        submodel_id,
                        store,
                        result,
                    )
                    .await?;
                }
            }
        }

        Ok(())
    }
    .boxed()
}

async fn externalize_blob(
    element: &mut Value,
    element_path: &str,
    submodel_id: &str,
    store: &dyn BlobStore,
    result: &mut ExternalizationResult,
) -> BlobResult<()> {
    let Some(value) = element.get("value").and_then(Value::as_str) else {
        return Ok(());
    };
    if value.is_empty() {
        return Ok(());
    }

    if let Some(blob_id) = blob_ref_id(value) {
        result
            .referenced
            .push((blob_id.to_string(), element_path.to_string()));
        return Ok(());
    }

    let content_type = element
        .get("contentType")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    // not base64: already externalized elsewhere or opaque; leave alone
    let Ok(content) = STANDARD.decode(value) else {
        return Ok(());
    };
    if !store.should_externalize(&content, &content_type) {
        return Ok(());
    }

    let metadata = store
        .store(
            submodel_id,
            element_path,
            Bytes::from(content),
            &content_type,
            None,
        )
        .await?;
    element["value"] = Value::String(format!("{BLOB_REF_PREFIX}{}", metadata.id));
    result.new_blobs.push(metadata);
    Ok(())
}

async fn externalize_file(
    element: &mut Value,
    element_path: &str,
    submodel_id: &str,
    store: &dyn BlobStore,
    result: &mut ExternalizationResult,
) -> BlobResult<()> {
    let Some(value) = element.get("value").and_then(Value::as_str) else {
        return Ok(());
    };
    if value.is_empty() {
        return Ok(());
    }

    if let Some(blob_id) = blob_ref_id(value) {
        result
            .referenced
            .push((blob_id.to_string(), element_path.to_string()));
        return Ok(());
    }

    // files only externalize from data URIs; plain paths stay untouched
    let Some((content, inferred_type)) = extract_data_uri(value) else {
        return Ok(());
    };
    let content_type = element
        .get("contentType")
        .and_then(Value::as_str)
        .unwrap_or(&inferred_type)
        .to_string();

    if !store.should_externalize(&content, &content_type) {
        return Ok(());
    }

    let filename = element.get("idShort").and_then(Value::as_str);
    let metadata = store
        .store(
            submodel_id,
            element_path,
            Bytes::from(content),
            &content_type,
            filename,
        )
        .await?;
    element["value"] = Value::String(format!("{BLOB_REF_PREFIX}{}", metadata.id));
    result.new_blobs.push(metadata);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlobConfig;
    use crate::local::LocalBlobStore;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::json;

    fn temp_store(threshold: usize) -> LocalBlobStore {
        let root = std::env::temp_dir()
            .join("titan-externalize-tests")
            .join(uuid::Uuid::new_v4().to_string());
        LocalBlobStore::new(
            root,
            BlobConfig::default().with_inline_threshold(threshold),
        )
    }

    #[tokio::test]
    async fn large_blob_is_replaced_by_reference() {
        let store = temp_store(16);
        let payload = vec![0xABu8; 64];
        let mut doc = json!({
            "id": "urn:example:sm:1",
            "submodelElements": [{
                "modelType": "Blob", "idShort": "firmware",
                "contentType": "application/octet-stream",
                "value": STANDARD.encode(&payload)
            }]
        });

        let result = externalize_submodel_doc(&mut doc, "urn:example:sm:1", &store)
            .await
            .unwrap();
        assert_eq!(result.new_blobs.len(), 1);
        assert_eq!(result.new_blobs[0].id_short_path, "firmware");

        let value = doc["submodelElements"][0]["value"].as_str().unwrap();
        assert!(value.starts_with(BLOB_REF_PREFIX));

        let stored = store.retrieve(&result.new_blobs[0]).await.unwrap();
        assert_eq!(stored.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn small_blob_stays_inline() {
        let store = temp_store(1024);
        let mut doc = json!({
            "id": "urn:example:sm:1",
            "submodelElements": [{
                "modelType": "Blob", "idShort": "icon",
                "contentType": "image/png",
                "value": STANDARD.encode(b"tiny")
            }]
        });
        let result = externalize_submodel_doc(&mut doc, "urn:example:sm:1", &store)
            .await
            .unwrap();
        assert!(result.new_blobs.is_empty());
        assert_eq!(
            doc["submodelElements"][0]["value"],
            STANDARD.encode(b"tiny")
        );
    }

    #[tokio::test]
    async fn existing_references_are_recorded_not_restored() {
        let store = temp_store(16);
        let mut doc = json!({
            "id": "urn:example:sm:1",
            "submodelElements": [{
                "modelType": "Blob", "idShort": "firmware",
                "contentType": "application/octet-stream",
                "value": "/blobs/11111111-2222-3333-4444-555555555555"
            }]
        });
        let result = externalize_submodel_doc(&mut doc, "urn:example:sm:1", &store)
            .await
            .unwrap();
        assert!(result.new_blobs.is_empty());
        assert_eq!(
            result.referenced,
            vec![(
                "11111111-2222-3333-4444-555555555555".to_string(),
                "firmware".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn file_data_uri_is_externalized_with_nested_path() {
        let store = temp_store(8);
        let payload = vec![1u8; 32];
        let mut doc = json!({
            "id": "urn:example:sm:1",
            "submodelElements": [{
                "modelType": "SubmodelElementCollection", "idShort": "docs",
                "value": [{
                    "modelType": "File", "idShort": "manual",
                    "contentType": "application/pdf",
                    "value": format!("data:application/pdf;base64,{}", STANDARD.encode(&payload))
                }]
            }]
        });
        let result = externalize_submodel_doc(&mut doc, "urn:example:sm:1", &store)
            .await
            .unwrap();
        assert_eq!(result.new_blobs.len(), 1);
        assert_eq!(result.new_blobs[0].id_short_path, "docs.manual");
        assert_eq!(result.new_blobs[0].content_type, "application/pdf");
    }

    #[tokio::test]
    async fn plain_file_paths_are_left_alone() {
        let store = temp_store(0);
        let mut doc = json!({
            "id": "urn:example:sm:1",
            "submodelElements": [{
                "modelType": "File", "idShort": "manual",
                "contentType": "application/pdf",
                "value": "/aasx/docs/manual.pdf"
            }]
        });
        let result = externalize_submodel_doc(&mut doc, "urn:example:sm:1", &store)
            .await
            .unwrap();
        assert!(result.new_blobs.is_empty());
        assert_eq!(doc["submodelElements"][0]["value"], "/aasx/docs/manual.pdf");
    }
}
