//! Template instantiation.
//!
//! A `kind=Template` Submodel defines structure without runtime values.
//! Instantiation deep-copies the template into a new `kind=Instance`
//! document with a fresh id, optional idShort override and value
//! overrides keyed by `idShortPath`.
//!
//! Blob policy: copy-on-instantiate. Template `/blobs/…` references are
//! inlined back to base64 before the instance is created, so the create
//! path re-externalizes them under the instance's own submodel id and the
//! single-owner cascade-delete rule keeps holding.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};

use titan_core::{TenantContext, TitanError, TitanResult};
use titan_model::validation::BLOB_REF_PREFIX;
use titan_model::Submodel;
use titan_projection::{navigate_mut, parse_id_short_path};

use crate::elements::apply_value_patch;
use crate::submodels::SubmodelRepository;

/// Request to instantiate a Submodel from a template.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantiationRequest {
    /// Identifier for the new instance.
    pub new_id: String,
    /// Optional idShort override.
    pub id_short: Option<String>,
    /// `idShortPath` -> new value, applied with `$value` semantics.
    #[serde(default)]
    pub value_overrides: Map<String, Value>,
    /// Whether the instance keeps the template's semanticId.
    #[serde(default = "default_true")]
    pub copy_semantic_id: bool,
}

fn default_true() -> bool {
    true
}

/// Build the instance document from a template document.
pub fn instantiate_template(
    template_doc: &Value,
    request: &InstantiationRequest,
) -> TitanResult<Value> {
    if template_doc.get("kind").and_then(Value::as_str) != Some("Template") {
        return Err(TitanError::bad_request(
            "source submodel is not a template (kind must be 'Template')",
        ));
    }

    let mut instance = template_doc.clone();
    instance["id"] = Value::String(request.new_id.clone());
    instance["kind"] = Value::String("Instance".to_string());
    if let Some(id_short) = &request.id_short {
        instance["idShort"] = Value::String(id_short.clone());
    }
    if !request.copy_semantic_id {
        if let Some(map) = instance.as_object_mut() {
            map.remove("semanticId");
        }
    }
    if let Some(admin) = instance.get_mut("administration").and_then(Value::as_object_mut) {
        admin.remove("templateId");
    }

    for (path, value) in &request.value_overrides {
        let steps = parse_id_short_path(path)?;
        let target = navigate_mut(&mut instance, &steps).ok_or_else(|| {
            TitanError::bad_request(format!("value override path '{path}' not found in template"))
        })?;
        apply_value_patch(target, value)?;
    }

    Ok(instance)
}

impl SubmodelRepository {
    /// Create a new Instance submodel from a stored Template.
    pub async fn instantiate(
        &self,
        ctx: &TenantContext,
        template_id: &str,
        request: &InstantiationRequest,
    ) -> TitanResult<(Vec<u8>, String)> {
        let template_doc = self.get_doc(ctx, template_id).await?;
        let mut instance_doc = instantiate_template(&template_doc, request)?;

        // copy-on-instantiate: inline template blob content so the create
        // path stores fresh copies owned by the instance
        self.inline_blob_refs(ctx, &mut instance_doc).await?;

        let submodel: Submodel = serde_json::from_value(instance_doc)
            .map_err(|e| TitanError::bad_request(format!("instantiated submodel is invalid: {e}")))?;
        self.create(ctx, submodel).await
    }

    async fn inline_blob_refs(&self, ctx: &TenantContext, doc: &mut Value) -> TitanResult<()> {
        let mut blob_ids = Vec::new();
        collect_blob_refs(doc, &mut blob_ids);
        if blob_ids.is_empty() {
            return Ok(());
        }

        let mut contents = HashMap::new();
        for blob_id in blob_ids {
            let row = self
                .store()
                .get_blob_row(ctx, &blob_id)
                .await?
                .ok_or_else(|| {
                    TitanError::not_found(format!("template references unknown blob '{blob_id}'"))
                })?;
            let content = self
                .blob_store
                .retrieve(&row)
                .await
                .map_err(TitanError::from)?;
            contents.insert(blob_id, STANDARD.encode(&content));
        }

        rewrite_blob_refs(doc, &contents);
        Ok(())
    }
}

fn is_binary_element(map: &Map<String, Value>) -> bool {
    matches!(
        map.get("modelType").and_then(Value::as_str),
        Some("Blob") | Some("File")
    )
}

fn collect_blob_refs(doc: &Value, out: &mut Vec<String>) {
    match doc {
        Value::Object(map) => {
            if is_binary_element(map) {
                if let Some(blob_id) = map
                    .get("value")
                    .and_then(Value::as_str)
                    .and_then(|v| v.strip_prefix(BLOB_REF_PREFIX))
                {
                    out.push(blob_id.to_string());
                    return;
                }
            }
            for child in map.values() {
                collect_blob_refs(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_blob_refs(child, out);
            }
        }
        _ => {}
    }
}

fn rewrite_blob_refs(doc: &mut Value, contents: &HashMap<String, String>) {
    match doc {
        Value::Object(map) => {
            if is_binary_element(map) {
                let blob_id = map
                    .get("value")
                    .and_then(Value::as_str)
                    .and_then(|v| v.strip_prefix(BLOB_REF_PREFIX))
                    .map(str::to_string);
                if let Some(blob_id) = blob_id {
                    if let Some(inline) = contents.get(&blob_id) {
                        // Files only re-externalize from data URIs; Blobs
                        // take raw base64
                        let value = if map.get("modelType").and_then(Value::as_str)
                            == Some("File")
                        {
                            let content_type = map
                                .get("contentType")
                                .and_then(Value::as_str)
                                .unwrap_or("application/octet-stream");
                            format!("data:{content_type};base64,{inline}")
                        } else {
                            inline.clone()
                        };
                        map.insert("value".to_string(), Value::String(value));
                    }
                    return;
                }
            }
            for child in map.values_mut() {
                rewrite_blob_refs(child, contents);
            }
        }
        Value::Array(items) => {
            for child in items.iter_mut() {
                rewrite_blob_refs(child, contents);
            }
        }
        _ => {}
    }
}
