//! IDTA serialization modifiers.
//!
//! Four orthogonal modifiers apply after navigation: `content` selects
//! which fields survive, `level` controls nesting depth, `extent` controls
//! blob inclusion, pagination applies before projection at the listing
//! layer.

use serde_json::{Map, Value};

use crate::error::ProjectionError;
use crate::value::extract_value;

/// `content` modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Content {
    #[default]
    Normal,
    Metadata,
    Value,
    Reference,
    Path,
}

/// `level` modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    Deep,
    Core,
}

/// `extent` modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Extent {
    #[default]
    WithBlobValue,
    WithoutBlobValue,
}

/// Parsed modifier set for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionModifiers {
    pub content: Content,
    pub level: Level,
    pub extent: Extent,
}

impl ProjectionModifiers {
    pub fn parse(
        level: Option<&str>,
        extent: Option<&str>,
        content: Option<&str>,
    ) -> Result<Self, ProjectionError> {
        let level = match level {
            None | Some("deep") => Level::Deep,
            Some("core") => Level::Core,
            Some(other) => return Err(ProjectionError::invalid_modifier("level", other)),
        };
        let extent = match extent {
            None | Some("withBlobValue") => Extent::WithBlobValue,
            Some("withoutBlobValue") => Extent::WithoutBlobValue,
            Some(other) => return Err(ProjectionError::invalid_modifier("extent", other)),
        };
        let content = match content {
            None | Some("normal") => Content::Normal,
            Some("metadata") => Content::Metadata,
            Some("value") => Content::Value,
            Some("reference") => Content::Reference,
            Some("path") => Content::Path,
            Some(other) => return Err(ProjectionError::invalid_modifier("content", other)),
        };
        Ok(Self { content, level, extent })
    }

    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// Fields kept by `content=metadata`.
const METADATA_FIELDS: [&str; 10] = [
    "modelType",
    "idShort",
    "semanticId",
    "supplementalSemanticIds",
    "qualifiers",
    "category",
    "description",
    "displayName",
    "extensions",
    "embeddedDataSpecifications",
];

/// Fields kept by `content=value` on non-collection shapes.
const VALUE_FIELDS: [&str; 13] = [
    "modelType",
    "value",
    "valueType",
    "min",
    "max",
    "contentType",
    "first",
    "second",
    "entityType",
    "globalAssetId",
    "specificAssetIds",
    "observed",
    "direction",
];

fn is_container(doc: &Map<String, Value>) -> bool {
    matches!(
        doc.get("modelType").and_then(Value::as_str),
        Some("SubmodelElementCollection") | Some("SubmodelElementList")
    )
}

/// Apply the `content`/`level`/`extent` modifiers to a document.
///
/// `content=value` on a single element collapses to the element's semantic
/// value ([`extract_value`]); on a Submodel it keeps the recursive
/// value-field projection so the element tree shape survives.
/// `content=reference` and `content=path` need identifier context and are
/// built at the repository layer.
pub fn apply_projection(payload: &Value, modifiers: &ProjectionModifiers) -> Value {
    let mut result = match modifiers.content {
        Content::Normal | Content::Reference | Content::Path => payload.clone(),
        Content::Metadata => project_metadata(payload),
        Content::Value => {
            let is_element = payload
                .get("modelType")
                .and_then(Value::as_str)
                .map(|tag| titan_model::ElementKind::parse(tag).is_ok())
                .unwrap_or(false);
            if is_element {
                return extract_value(payload).unwrap_or(Value::Null);
            }
            project_value(payload)
        }
    };

    if modifiers.level == Level::Core {
        result = apply_core_level(&result);
    }
    if modifiers.extent == Extent::WithoutBlobValue {
        result = strip_blob_values(&result);
    }
    result
}

fn project_children(items: &[Value], project: fn(&Value) -> Value) -> Value {
    Value::Array(items.iter().map(project).collect())
}

fn project_metadata(payload: &Value) -> Value {
    let Some(doc) = payload.as_object() else {
        return payload.clone();
    };
    let mut result = Map::new();
    for (key, value) in doc {
        if key == "submodelElements" {
            if let Some(items) = value.as_array() {
                result.insert(key.clone(), project_children(items, project_metadata));
                continue;
            }
        }
        if key == "value" && is_container(doc) {
            if let Some(items) = value.as_array() {
                result.insert(key.clone(), project_children(items, project_metadata));
                continue;
            }
        }
        if METADATA_FIELDS.contains(&key.as_str()) {
            result.insert(key.clone(), value.clone());
        }
    }
    Value::Object(result)
}

fn project_value(payload: &Value) -> Value {
    let Some(doc) = payload.as_object() else {
        return payload.clone();
    };
    let mut result = Map::new();
    for (key, value) in doc {
        if key == "submodelElements" {
            if let Some(items) = value.as_array() {
                result.insert(key.clone(), project_children(items, project_value));
                continue;
            }
        }
        if key == "value" && is_container(doc) {
            if let Some(items) = value.as_array() {
                result.insert(key.clone(), project_children(items, project_value));
                continue;
            }
        }
        if VALUE_FIELDS.contains(&key.as_str()) {
            result.insert(key.clone(), value.clone());
        }
    }
    Value::Object(result)
}

/// `level=core` suppresses nested children.
fn apply_core_level(payload: &Value) -> Value {
    let Some(doc) = payload.as_object() else {
        return payload.clone();
    };
    let mut result = Map::new();
    for (key, value) in doc {
        if matches!(
            key.as_str(),
            "submodelElements" | "statements" | "annotations"
        ) {
            continue;
        }
        if key == "value" && is_container(doc) {
            continue;
        }
        result.insert(key.clone(), value.clone());
    }
    Value::Object(result)
}

/// `extent=withoutBlobValue` strips `value` from every Blob subtree.
fn strip_blob_values(payload: &Value) -> Value {
    let Some(doc) = payload.as_object() else {
        return payload.clone();
    };
    let mut result = doc.clone();

    if doc.get("modelType").and_then(Value::as_str) == Some("Blob") {
        result.remove("value");
    }
    for key in ["submodelElements", "statements", "annotations"] {
        if let Some(items) = doc.get(key).and_then(Value::as_array) {
            result.insert(key.to_string(), project_children(items, strip_blob_values));
        }
    }
    if is_container(doc) {
        if let Some(items) = doc.get("value").and_then(Value::as_array) {
            result.insert("value".to_string(), project_children(items, strip_blob_values));
        }
    }
    Value::Object(result)
}
