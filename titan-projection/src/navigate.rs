//! `idShortPath` navigation over JSON documents.
//!
//! Walks a Submodel (or nested element) by alternating name and index
//! steps. Name steps search the element arrays a variant can host:
//! `submodelElements` on a Submodel, `value` on collections and lists,
//! `statements` on entities and `annotations` on annotated relationships.
//! Operation variables are reachable through the synthetic segments
//! `inputVariables[i]` / `outputVariables[i]` / `inoutputVariables[i]`.

use serde_json::Value;

use crate::path::PathStep;

const VARIABLE_KEYS: [&str; 3] = ["inputVariables", "outputVariables", "inoutputVariables"];

/// Where the walk currently stands.
enum Cursor<'a> {
    /// A submodel or submodel element document.
    Element(&'a Value),
    /// An operation-variable array; the next step must be an index.
    Variables(&'a Vec<Value>),
}

/// Navigate to the subtree addressed by `steps`.
///
/// Returns `None` when any step does not resolve.
pub fn navigate<'a>(doc: &'a Value, steps: &[PathStep]) -> Option<&'a Value> {
    let mut cursor = Cursor::Element(doc);

    for step in steps {
        cursor = match (cursor, step) {
            (Cursor::Element(current), PathStep::Name(name)) => {
                let variables = VARIABLE_KEYS
                    .contains(&name.as_str())
                    .then(|| current.get(name.as_str()).and_then(Value::as_array))
                    .flatten();
                match variables {
                    Some(variables) => Cursor::Variables(variables),
                    None => Cursor::Element(find_child(current, name)?),
                }
            }
            (Cursor::Element(current), PathStep::Index(index)) => {
                let items = current.get("value").and_then(Value::as_array)?;
                Cursor::Element(items.get(*index)?)
            }
            (Cursor::Variables(variables), PathStep::Index(index)) => {
                Cursor::Element(variables.get(*index)?.get("value")?)
            }
            // a variable array can only be indexed
            (Cursor::Variables(_), PathStep::Name(_)) => return None,
        };
    }

    match cursor {
        Cursor::Element(value) => Some(value),
        Cursor::Variables(_) => None,
    }
}

/// Mutable navigation used by the write path (element replace/patch).
pub fn navigate_mut<'a>(doc: &'a mut Value, steps: &[PathStep]) -> Option<&'a mut Value> {
    let mut current = doc;

    for step in steps {
        current = match step {
            PathStep::Name(name) => {
                if VARIABLE_KEYS.contains(&name.as_str()) && current.get(name.as_str()).is_some() {
                    current.get_mut(name.as_str())?
                } else {
                    find_child_mut(current, name)?
                }
            }
            PathStep::Index(index) => {
                let has_value_array = current.get("value").and_then(Value::as_array).is_some();
                if has_value_array {
                    current.get_mut("value").and_then(Value::as_array_mut)?.get_mut(*index)?
                } else if current.is_array() {
                    // operation-variable array: unwrap the variable's value
                    current.as_array_mut()?.get_mut(*index)?.get_mut("value")?
                } else {
                    return None;
                }
            }
        };
    }
    Some(current)
}

/// Child element arrays hosted by a document, in lookup order.
fn child_arrays<'a>(doc: &'a Value) -> impl Iterator<Item = &'a Vec<Value>> {
    ["submodelElements", "value", "statements", "annotations"]
        .into_iter()
        .filter_map(|key| doc.get(key).and_then(Value::as_array))
}

fn find_child<'a>(doc: &'a Value, id_short: &str) -> Option<&'a Value> {
    for array in child_arrays(doc) {
        for element in array {
            if element.get("idShort").and_then(Value::as_str) == Some(id_short) {
                return Some(element);
            }
        }
    }
    None
}

fn find_child_mut<'a>(doc: &'a mut Value, id_short: &str) -> Option<&'a mut Value> {
    for key in ["submodelElements", "value", "statements", "annotations"] {
        let found = doc
            .get(key)
            .and_then(Value::as_array)
            .map(|array| {
                array.iter().position(|element| {
                    element.get("idShort").and_then(Value::as_str) == Some(id_short)
                })
            })
            .unwrap_or(None);
        if let Some(position) = found {
            return doc
                .get_mut(key)
                .and_then(Value::as_array_mut)
                .and_then(|array| array.get_mut(position));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::parse_id_short_path;
    use serde_json::json;

    fn sample_submodel() -> Value {
        json!({
            "id": "urn:example:sm:1",
            "submodelElements": [
                {
                    "modelType": "SubmodelElementCollection",
                    "idShort": "address",
                    "value": [
                        {"modelType": "Property", "idShort": "city",
                         "valueType": "xs:string", "value": "Boston"}
                    ]
                },
                {
                    "modelType": "SubmodelElementList",
                    "idShort": "measurements",
                    "value": [
                        {"modelType": "Property", "valueType": "xs:int", "value": "1"},
                        {"modelType": "Property", "valueType": "xs:int", "value": "2"}
                    ]
                },
                {
                    "modelType": "Operation",
                    "idShort": "calibrate",
                    "inputVariables": [
                        {"value": {"modelType": "Property", "idShort": "target",
                                   "valueType": "xs:double"}}
                    ]
                },
                {
                    "modelType": "Entity",
                    "idShort": "motor",
                    "entityType": "SelfManagedEntity",
                    "statements": [
                        {"modelType": "Property", "idShort": "power",
                         "valueType": "xs:string", "value": "1kW"}
                    ]
                }
            ]
        })
    }

    fn resolve<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
        navigate(doc, &parse_id_short_path(path).unwrap())
    }

    #[test]
    fn empty_path_returns_document() {
        let doc = sample_submodel();
        assert_eq!(resolve(&doc, "").unwrap(), &doc);
    }

    #[test]
    fn navigates_collections_and_lists() {
        let doc = sample_submodel();
        assert_eq!(resolve(&doc, "address.city").unwrap()["value"], "Boston");
        assert_eq!(resolve(&doc, "measurements[1]").unwrap()["value"], "2");
        assert!(resolve(&doc, "measurements[2]").is_none());
        assert!(resolve(&doc, "address.zip").is_none());
    }

    #[test]
    fn navigates_operation_variables() {
        let doc = sample_submodel();
        let target = resolve(&doc, "calibrate.inputVariables[0]").unwrap();
        assert_eq!(target["idShort"], "target");
    }

    #[test]
    fn navigates_entity_statements() {
        let doc = sample_submodel();
        assert_eq!(resolve(&doc, "motor.power").unwrap()["value"], "1kW");
    }

    #[test]
    fn navigate_mut_reaches_same_subtree() {
        let mut doc = sample_submodel();
        let steps = parse_id_short_path("address.city").unwrap();
        navigate_mut(&mut doc, &steps).unwrap()["value"] = json!("Cambridge");
        assert_eq!(resolve(&doc, "address.city").unwrap()["value"], "Cambridge");
    }
}
