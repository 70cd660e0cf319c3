//! References and keys.
//!
//! References are always by identifier, never by in-memory pointer;
//! serialization stays tree-shaped even for cyclic reference graphs.

use serde::{Deserialize, Serialize};

/// Type of a key in a [`Reference`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    AssetAdministrationShell,
    Submodel,
    ConceptDescription,
    AnnotatedRelationshipElement,
    BasicEventElement,
    Blob,
    Capability,
    DataElement,
    Entity,
    EventElement,
    File,
    FragmentReference,
    GlobalReference,
    Identifiable,
    MultiLanguageProperty,
    Operation,
    Property,
    Range,
    Referable,
    ReferenceElement,
    RelationshipElement,
    SubmodelElement,
    SubmodelElementCollection,
    SubmodelElementList,
}

/// Type of a Reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceType {
    ExternalReference,
    ModelReference,
}

/// A key in a reference chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Key {
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub value: String,
}

impl Key {
    pub fn new(key_type: KeyType, value: impl Into<String>) -> Self {
        Self {
            key_type,
            value: value.into(),
        }
    }
}

/// A reference to an element, external or within the AAS ecosystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Reference {
    #[serde(rename = "type")]
    pub reference_type: ReferenceType,
    pub keys: Vec<Key>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_semantic_id: Option<Box<Reference>>,
}

impl Reference {
    /// A model reference to a locally identified entity.
    pub fn model(key_type: KeyType, id: impl Into<String>) -> Self {
        Self {
            reference_type: ReferenceType::ModelReference,
            keys: vec![Key::new(key_type, id)],
            referred_semantic_id: None,
        }
    }

    /// An external (global) reference.
    pub fn external(id: impl Into<String>) -> Self {
        Self {
            reference_type: ReferenceType::ExternalReference,
            keys: vec![Key::new(KeyType::GlobalReference, id)],
            referred_semantic_id: None,
        }
    }

    /// The identifier carried by the first key, if any.
    pub fn first_key_value(&self) -> Option<&str> {
        self.keys.first().map(|k| k.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_serializes_camel_case() {
        let reference = Reference::model(KeyType::Submodel, "urn:example:sm:1");
        let json = serde_json::to_value(&reference).unwrap();
        assert_eq!(json["type"], "ModelReference");
        assert_eq!(json["keys"][0]["type"], "Submodel");
        assert_eq!(json["keys"][0]["value"], "urn:example:sm:1");
    }

    #[test]
    fn reference_rejects_unknown_fields() {
        let bad = serde_json::json!({
            "type": "ExternalReference",
            "keys": [{"type": "GlobalReference", "value": "x"}],
            "extra": 1
        });
        assert!(serde_json::from_value::<Reference>(bad).is_err());
    }
}
