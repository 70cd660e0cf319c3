//! JSON merge-patch (IDTA default semantics).
//!
//! Deep merge where a `null` patch member deletes the key and arrays are
//! replaced wholesale, never merged.

use serde_json::Value;

/// Apply `patch` to `target` in place.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Some(patch_map) = patch.as_object() else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    let Value::Object(target_map) = target else {
        return;
    };

    for (key, patch_value) in patch_map {
        if patch_value.is_null() {
            target_map.remove(key);
        } else if patch_value.is_object() {
            let entry = target_map
                .entry(key.clone())
                .or_insert(Value::Object(serde_json::Map::new()));
            merge_patch(entry, patch_value);
        } else {
            target_map.insert(key.clone(), patch_value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_deletes_and_scalars_replace() {
        let mut doc = json!({"a": 1, "b": {"c": 2, "d": 3}});
        merge_patch(&mut doc, &json!({"a": null, "b": {"c": 20}}));
        assert_eq!(doc, json!({"b": {"c": 20, "d": 3}}));
    }

    #[test]
    fn arrays_are_replaced_not_merged() {
        let mut doc = json!({"items": [1, 2, 3]});
        merge_patch(&mut doc, &json!({"items": [9]}));
        assert_eq!(doc, json!({"items": [9]}));
    }

    #[test]
    fn nested_objects_are_created_on_demand() {
        let mut doc = json!({"a": 1});
        merge_patch(&mut doc, &json!({"b": {"c": true}}));
        assert_eq!(doc, json!({"a": 1, "b": {"c": true}}));
    }

    #[test]
    fn non_object_patch_replaces_document() {
        let mut doc = json!({"a": 1});
        merge_patch(&mut doc, &json!("text"));
        assert_eq!(doc, json!("text"));
    }
}
