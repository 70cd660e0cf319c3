//! `$value` extraction, `$reference` and `$path` builders.

use serde_json::{json, Value};

use titan_model::ElementKind;

use crate::path::{append_index, append_segment};

/// Extract the semantic value of a submodel element per variant.
///
/// Variants without a value notion (Capability, Operation, relationship
/// and event elements) yield `None`.
pub fn extract_value(element: &Value) -> Option<Value> {
    let model_type = element.get("modelType")?.as_str()?;
    let kind = ElementKind::parse(model_type).ok()?;

    match kind {
        ElementKind::Property
        | ElementKind::MultiLanguageProperty
        | ElementKind::Blob
        | ElementKind::File
        | ElementKind::ReferenceElement => element.get("value").cloned(),
        ElementKind::Range => Some(json!({
            "min": element.get("min").cloned().unwrap_or(Value::Null),
            "max": element.get("max").cloned().unwrap_or(Value::Null),
        })),
        ElementKind::SubmodelElementCollection | ElementKind::SubmodelElementList => {
            let nested = element.get("value").and_then(Value::as_array)?;
            Some(Value::Array(
                nested
                    .iter()
                    .map(|child| extract_value(child).unwrap_or(Value::Null))
                    .collect(),
            ))
        }
        ElementKind::Entity => Some(json!({
            "entityType": element.get("entityType").cloned().unwrap_or(Value::Null),
            "globalAssetId": element.get("globalAssetId").cloned().unwrap_or(Value::Null),
            "specificAssetIds": element.get("specificAssetIds").cloned().unwrap_or(Value::Null),
        })),
        ElementKind::RelationshipElement
        | ElementKind::AnnotatedRelationshipElement
        | ElementKind::Capability
        | ElementKind::Operation
        | ElementKind::BasicEventElement => None,
    }
}

/// `content=reference`: a model reference from the hosting Submodel down
/// to the addressed element.
pub fn element_reference(submodel_id: &str, id_short_path: &str, element: &Value) -> Value {
    let mut keys = vec![json!({"type": "Submodel", "value": submodel_id})];
    if !id_short_path.is_empty() {
        let key_type = element
            .get("modelType")
            .and_then(Value::as_str)
            .unwrap_or("SubmodelElement");
        keys.push(json!({"type": key_type, "value": id_short_path}));
    }
    json!({"type": "ModelReference", "keys": keys})
}

/// `content=path`: every navigable `idShortPath` in the subtree, the
/// addressed element first, depth-first in document order.
pub fn collect_paths(doc: &Value, base: &str) -> Vec<String> {
    let mut paths = Vec::new();
    if !base.is_empty() {
        paths.push(base.to_string());
    }
    collect_child_paths(doc, base, &mut paths);
    paths
}

fn collect_child_paths(doc: &Value, base: &str, out: &mut Vec<String>) {
    let Some(map) = doc.as_object() else { return };
    let in_list = map.get("modelType").and_then(Value::as_str) == Some("SubmodelElementList");

    for key in ["submodelElements", "value", "statements", "annotations"] {
        let Some(items) = map.get(key).and_then(Value::as_array) else {
            continue;
        };
        // non-container `value` strings are element values, not children
        if key == "value" && !is_element_array(items) {
            continue;
        }
        for (index, child) in items.iter().enumerate() {
            let child_path = if in_list {
                append_index(base, index)
            } else if let Some(id_short) = child.get("idShort").and_then(Value::as_str) {
                append_segment(base, id_short)
            } else {
                continue;
            };
            out.push(child_path.clone());
            collect_child_paths(child, &child_path, out);
        }
    }
}

fn is_element_array(items: &[Value]) -> bool {
    items
        .iter()
        .all(|item| {
            item.as_object()
                .map(|map| map.contains_key("modelType"))
                .unwrap_or(false)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_value_is_the_stored_string() {
        let element = json!({"modelType": "Property", "idShort": "p",
                             "valueType": "xs:string", "value": "Boston"});
        assert_eq!(extract_value(&element).unwrap(), json!("Boston"));
    }

    #[test]
    fn range_value_is_min_max() {
        let element = json!({"modelType": "Range", "idShort": "r",
                             "valueType": "xs:int", "min": "0", "max": "10"});
        assert_eq!(extract_value(&element).unwrap(), json!({"min": "0", "max": "10"}));
    }

    #[test]
    fn collection_value_preserves_length() {
        let element = json!({
            "modelType": "SubmodelElementCollection",
            "idShort": "c",
            "value": [
                {"modelType": "Property", "idShort": "a", "valueType": "xs:int", "value": "1"},
                {"modelType": "Capability", "idShort": "cap"},
                {"modelType": "Property", "idShort": "b", "valueType": "xs:int", "value": "2"}
            ]
        });
        let extracted = extract_value(&element).unwrap();
        assert_eq!(extracted, json!(["1", null, "2"]));
    }

    #[test]
    fn capability_has_no_value() {
        let element = json!({"modelType": "Capability", "idShort": "cap"});
        assert!(extract_value(&element).is_none());
    }

    #[test]
    fn reference_points_through_submodel() {
        let element = json!({"modelType": "Property", "idShort": "city"});
        let reference = element_reference("urn:example:sm:1", "address.city", &element);
        assert_eq!(reference["type"], "ModelReference");
        assert_eq!(reference["keys"][0]["value"], "urn:example:sm:1");
        assert_eq!(reference["keys"][1]["type"], "Property");
        assert_eq!(reference["keys"][1]["value"], "address.city");
    }

    #[test]
    fn collect_paths_walks_lists_by_index() {
        let doc = json!({
            "id": "urn:example:sm:1",
            "submodelElements": [
                {"modelType": "SubmodelElementList", "idShort": "m",
                 "value": [{"modelType": "Property", "valueType": "xs:int"},
                            {"modelType": "Property", "valueType": "xs:int"}]},
                {"modelType": "SubmodelElementCollection", "idShort": "c",
                 "value": [{"modelType": "Property", "idShort": "x",
                            "valueType": "xs:int"}]}
            ]
        });
        assert_eq!(
            collect_paths(&doc, ""),
            vec!["m", "m[0]", "m[1]", "c", "c.x"]
        );
    }
}
