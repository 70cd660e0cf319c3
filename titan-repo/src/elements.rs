//! Submodel-element operations.
//!
//! Every element endpoint operates on the hosting Submodel as one atomic
//! unit: navigate into an in-memory clone, mutate, re-canonicalize and
//! rewrite the row. Each mutation emits a `SubmodelElement` event in
//! addition to the enclosing Submodel's `UPDATED`.

use serde_json::{json, Value};

use titan_core::{TenantContext, TitanError, TitanResult};
use titan_events::EventType;
use titan_model::{validation, ElementKind, SubmodelElement};
use titan_projection::{
    append_index, append_segment, extract_value, merge_patch, navigate, navigate_mut,
    parse_id_short_path, PathStep,
};

use crate::repo::IfMatch;
use crate::submodels::SubmodelRepository;

/// Outcome of creating an element: the child's `idShortPath` for the
/// `Location` header plus the rewritten submodel's bytes and ETag.
#[derive(Debug, Clone)]
pub struct CreatedElement {
    pub id_short_path: String,
    pub doc_bytes: Vec<u8>,
    pub etag: String,
}

impl SubmodelRepository {
    /// Pure navigation: the subtree addressed by `path`.
    pub async fn get_element(
        &self,
        ctx: &TenantContext,
        submodel_id: &str,
        path: &str,
    ) -> TitanResult<Value> {
        let doc = self.get_doc(ctx, submodel_id).await?;
        let steps = parse_id_short_path(path)?;
        navigate(&doc, &steps)
            .cloned()
            .ok_or_else(|| element_not_found(submodel_id, path))
    }

    /// Insert `element` into the submodel root or the addressed
    /// collection/list. Lists address the child by its synthesized index.
    pub async fn create_element(
        &self,
        ctx: &TenantContext,
        submodel_id: &str,
        parent_path: &str,
        element: SubmodelElement,
    ) -> TitanResult<CreatedElement> {
        let row = self.get_row(ctx, submodel_id).await?;
        let mut doc = row.doc.clone();

        let new_path;
        {
            let (target, parent_is_list) = if parent_path.is_empty() {
                if doc.get("submodelElements").is_none() {
                    doc["submodelElements"] = json!([]);
                }
                let Some(children) =
                    doc.get_mut("submodelElements").and_then(Value::as_array_mut)
                else {
                    return Err(TitanError::internal("submodelElements is not an array"));
                };
                (children, false)
            } else {
                let steps = parse_id_short_path(parent_path)?;
                let parent = navigate_mut(&mut doc, &steps)
                    .ok_or_else(|| element_not_found(submodel_id, parent_path))?;
                let kind = element_kind(parent)?;
                if !kind.is_container() {
                    return Err(TitanError::bad_request(format!(
                        "cannot create children under a {}",
                        kind.as_str()
                    )));
                }
                if parent.get("value").is_none() {
                    parent["value"] = json!([]);
                }
                let is_list = kind == ElementKind::SubmodelElementList;
                let Some(children) = parent.get_mut("value").and_then(Value::as_array_mut) else {
                    return Err(TitanError::bad_request("container value is not an array"));
                };
                (children, is_list)
            };

            validation::validate_element(&element, parent_is_list)?;

            if parent_is_list {
                new_path = append_index(parent_path, target.len());
            } else {
                let id_short = element.id_short().ok_or_else(|| {
                    TitanError::bad_request("element requires an idShort outside a list")
                })?;
                if target
                    .iter()
                    .any(|child| child.get("idShort").and_then(Value::as_str) == Some(id_short))
                {
                    return Err(TitanError::conflict(format!(
                        "element '{id_short}' already exists in the target container"
                    )));
                }
                new_path = append_segment(parent_path, id_short);
            }

            let element_doc = serde_json::to_value(&element)
                .map_err(|e| TitanError::internal_from("element serialization failed", e))?;
            target.push(element_doc);
        }

        let (doc_bytes, etag) = self.replace_doc(ctx, submodel_id, doc, &IfMatch::Any).await?;
        self.emit_element_event(
            submodel_id,
            &new_path,
            EventType::Created,
            value_bytes_for(&element),
        )
        .await;

        Ok(CreatedElement {
            id_short_path: new_path,
            doc_bytes,
            etag,
        })
    }

    /// Replace the addressed element; the variant must not change.
    pub async fn replace_element(
        &self,
        ctx: &TenantContext,
        submodel_id: &str,
        path: &str,
        element: SubmodelElement,
    ) -> TitanResult<(Vec<u8>, String)> {
        let row = self.get_row(ctx, submodel_id).await?;
        let mut doc = row.doc.clone();
        let steps = parse_id_short_path(path)?;
        // an index step addresses a list child only when the parent is a
        // SubmodelElementList (operation variables also index)
        let in_list = match steps.split_last() {
            Some((PathStep::Index(_), parent_steps)) => navigate(&doc, parent_steps)
                .map(|parent| {
                    parent.get("modelType").and_then(Value::as_str)
                        == Some("SubmodelElementList")
                })
                .unwrap_or(false),
            _ => false,
        };
        validation::validate_element(&element, in_list)?;

        {
            let current = navigate_mut(&mut doc, &steps)
                .ok_or_else(|| element_not_found(submodel_id, path))?;
            let current_kind = element_kind(current)?;
            if current_kind != element.kind() {
                return Err(TitanError::bad_request(format!(
                    "element type mismatch: stored {} cannot be replaced by {}",
                    current_kind.as_str(),
                    element.kind().as_str()
                )));
            }
            *current = serde_json::to_value(&element)
                .map_err(|e| TitanError::internal_from("element serialization failed", e))?;
        }

        let result = self.replace_doc(ctx, submodel_id, doc, &IfMatch::Any).await?;
        self.emit_element_event(
            submodel_id,
            path,
            EventType::Updated,
            value_bytes_for(&element),
        )
        .await;
        Ok(result)
    }

    /// Merge-patch the addressed element.
    pub async fn patch_element(
        &self,
        ctx: &TenantContext,
        submodel_id: &str,
        path: &str,
        partial: &Value,
    ) -> TitanResult<(Vec<u8>, String)> {
        let row = self.get_row(ctx, submodel_id).await?;
        let mut doc = row.doc.clone();
        let steps = parse_id_short_path(path)?;

        let patched_value;
        {
            let current = navigate_mut(&mut doc, &steps)
                .ok_or_else(|| element_not_found(submodel_id, path))?;
            merge_patch(current, partial);
            // the patched subtree must still parse as a submodel element
            let parsed: SubmodelElement = serde_json::from_value(current.clone())
                .map_err(|e| TitanError::bad_request(format!("patched element is invalid: {e}")))?;
            patched_value = value_bytes_for(&parsed);
        }

        let result = self.replace_doc(ctx, submodel_id, doc, &IfMatch::Any).await?;
        self.emit_element_event(submodel_id, path, EventType::Updated, patched_value)
            .await;
        Ok(result)
    }

    /// Value-only patch (`$value` semantics per variant).
    pub async fn patch_element_value(
        &self,
        ctx: &TenantContext,
        submodel_id: &str,
        path: &str,
        value: &Value,
    ) -> TitanResult<(Vec<u8>, String)> {
        let row = self.get_row(ctx, submodel_id).await?;
        let mut doc = row.doc.clone();
        let steps = parse_id_short_path(path)?;

        let value_bytes;
        {
            let current = navigate_mut(&mut doc, &steps)
                .ok_or_else(|| element_not_found(submodel_id, path))?;
            apply_value_patch(current, value)?;
            value_bytes = extract_value(current).and_then(|v| serde_json::to_vec(&v).ok());
        }

        let result = self.replace_doc(ctx, submodel_id, doc, &IfMatch::Any).await?;
        self.emit_element_event(submodel_id, path, EventType::Updated, value_bytes)
            .await;
        Ok(result)
    }

    /// Remove the addressed element, cascading blobs referenced only by
    /// the removed subtree.
    pub async fn delete_element(
        &self,
        ctx: &TenantContext,
        submodel_id: &str,
        path: &str,
    ) -> TitanResult<(Vec<u8>, String)> {
        let row = self.get_row(ctx, submodel_id).await?;
        let mut doc = row.doc.clone();
        let steps = parse_id_short_path(path)?;
        if steps.is_empty() {
            return Err(TitanError::bad_request("cannot delete an empty path"));
        }

        remove_element(&mut doc, &steps)
            .ok_or_else(|| element_not_found(submodel_id, path))?;

        let result = self.replace_doc(ctx, submodel_id, doc, &IfMatch::Any).await?;
        self.emit_element_event(submodel_id, path, EventType::Deleted, None)
            .await;
        Ok(result)
    }
}

fn element_not_found(submodel_id: &str, path: &str) -> TitanError {
    TitanError::not_found(format!(
        "submodel element '{path}' not found in '{submodel_id}'"
    ))
}

fn element_kind(element: &Value) -> TitanResult<ElementKind> {
    let model_type = element
        .get("modelType")
        .and_then(Value::as_str)
        .ok_or_else(|| TitanError::bad_request("element has no modelType"))?;
    ElementKind::parse(model_type).map_err(|e| TitanError::bad_request(e.to_string()))
}

fn value_bytes_for(element: &SubmodelElement) -> Option<Vec<u8>> {
    let doc = serde_json::to_value(element).ok()?;
    let value = extract_value(&doc)?;
    serde_json::to_vec(&value).ok()
}

/// Remove the element addressed by `steps` from its parent array.
fn remove_element(doc: &mut Value, steps: &[PathStep]) -> Option<Value> {
    let (last, parent_steps) = steps.split_last()?;
    let parent = navigate_mut(doc, parent_steps)?;

    match last {
        PathStep::Index(index) => {
            let items = parent.get_mut("value").and_then(Value::as_array_mut)?;
            if *index >= items.len() {
                return None;
            }
            Some(items.remove(*index))
        }
        PathStep::Name(name) => {
            for key in ["submodelElements", "value", "statements", "annotations"] {
                let position = parent
                    .get(key)
                    .and_then(Value::as_array)
                    .and_then(|items| {
                        items.iter().position(|child| {
                            child.get("idShort").and_then(Value::as_str) == Some(name.as_str())
                        })
                    });
                if let Some(position) = position {
                    let items = parent.get_mut(key).and_then(Value::as_array_mut)?;
                    return Some(items.remove(position));
                }
            }
            None
        }
    }
}

/// `$value` patch semantics by variant.
///
/// Blob and File never accept inline value patches; their content goes
/// through the attachment endpoint.
pub(crate) fn apply_value_patch(element: &mut Value, value: &Value) -> TitanResult<()> {
    let kind = element_kind(element)?;
    match kind {
        ElementKind::Property => {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Err(TitanError::bad_request(format!(
                        "Property value must be a scalar, got {other}"
                    )))
                }
            };
            element["value"] = Value::String(text);
        }
        ElementKind::Range => {
            let Some(range) = value.as_object() else {
                return Err(TitanError::bad_request("Range value must be {min, max}"));
            };
            if let Some(min) = range.get("min") {
                element["min"] = min.clone();
            }
            if let Some(max) = range.get("max") {
                element["max"] = max.clone();
            }
        }
        ElementKind::MultiLanguageProperty => {
            if !value.is_array() {
                return Err(TitanError::bad_request(
                    "MultiLanguageProperty value must be a language-string list",
                ));
            }
            element["value"] = value.clone();
        }
        ElementKind::ReferenceElement => {
            element["value"] = value.clone();
        }
        ElementKind::SubmodelElementCollection | ElementKind::SubmodelElementList => {
            let Some(values) = value.as_array() else {
                return Err(TitanError::bad_request(
                    "container value patch must be a list of nested values in order",
                ));
            };
            let Some(children) = element.get_mut("value").and_then(Value::as_array_mut) else {
                return Err(TitanError::bad_request("container has no children to patch"));
            };
            if values.len() != children.len() {
                return Err(TitanError::bad_request(format!(
                    "value list length {} does not match container size {}",
                    values.len(),
                    children.len()
                )));
            }
            for (child, child_value) in children.iter_mut().zip(values) {
                apply_value_patch(child, child_value)?;
            }
        }
        ElementKind::Blob | ElementKind::File => {
            return Err(TitanError::bad_request(format!(
                "{} values are patched through the attachment endpoint",
                kind.as_str()
            )));
        }
        other => {
            return Err(TitanError::bad_request(format!(
                "{} has no value to patch",
                other.as_str()
            )));
        }
    }
    Ok(())
}
