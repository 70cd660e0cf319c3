//! Closed enumerations of the metamodel.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// The closed set of concrete `SubmodelElement` variants, keyed by the
/// `modelType` discriminator. Sites that care about variant (projection,
/// externalization, value extraction) match this exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Property,
    MultiLanguageProperty,
    Range,
    Blob,
    File,
    ReferenceElement,
    RelationshipElement,
    AnnotatedRelationshipElement,
    Entity,
    Capability,
    Operation,
    BasicEventElement,
    SubmodelElementCollection,
    SubmodelElementList,
}

impl ElementKind {
    /// Parse a `modelType` value; unknown values are rejected.
    pub fn parse(model_type: &str) -> Result<Self, ModelError> {
        match model_type {
            "Property" => Ok(Self::Property),
            "MultiLanguageProperty" => Ok(Self::MultiLanguageProperty),
            "Range" => Ok(Self::Range),
            "Blob" => Ok(Self::Blob),
            "File" => Ok(Self::File),
            "ReferenceElement" => Ok(Self::ReferenceElement),
            "RelationshipElement" => Ok(Self::RelationshipElement),
            "AnnotatedRelationshipElement" => Ok(Self::AnnotatedRelationshipElement),
            "Entity" => Ok(Self::Entity),
            "Capability" => Ok(Self::Capability),
            "Operation" => Ok(Self::Operation),
            "BasicEventElement" => Ok(Self::BasicEventElement),
            "SubmodelElementCollection" => Ok(Self::SubmodelElementCollection),
            "SubmodelElementList" => Ok(Self::SubmodelElementList),
            other => Err(ModelError::UnknownModelType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Property => "Property",
            Self::MultiLanguageProperty => "MultiLanguageProperty",
            Self::Range => "Range",
            Self::Blob => "Blob",
            Self::File => "File",
            Self::ReferenceElement => "ReferenceElement",
            Self::RelationshipElement => "RelationshipElement",
            Self::AnnotatedRelationshipElement => "AnnotatedRelationshipElement",
            Self::Entity => "Entity",
            Self::Capability => "Capability",
            Self::Operation => "Operation",
            Self::BasicEventElement => "BasicEventElement",
            Self::SubmodelElementCollection => "SubmodelElementCollection",
            Self::SubmodelElementList => "SubmodelElementList",
        }
    }

    /// Variants whose children live in a `value` array.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::SubmodelElementCollection | Self::SubmodelElementList
        )
    }
}

/// Kind of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Type,
    Instance,
    NotApplicable,
}

/// Modelling kind of a Submodel: a template has no runtime values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModellingKind {
    Template,
    Instance,
}

/// Type of an Entity element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityType {
    CoManagedEntity,
    SelfManagedEntity,
}

/// Direction of a BasicEventElement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

/// State of a BasicEventElement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateOfEvent {
    On,
    Off,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_unknown_model_type() {
        assert!(ElementKind::parse("Property").is_ok());
        assert!(matches!(
            ElementKind::parse("PropertyX"),
            Err(ModelError::UnknownModelType(_))
        ));
    }

    #[test]
    fn parse_roundtrips_every_variant() {
        for kind in [
            ElementKind::Property,
            ElementKind::MultiLanguageProperty,
            ElementKind::Range,
            ElementKind::Blob,
            ElementKind::File,
            ElementKind::ReferenceElement,
            ElementKind::RelationshipElement,
            ElementKind::AnnotatedRelationshipElement,
            ElementKind::Entity,
            ElementKind::Capability,
            ElementKind::Operation,
            ElementKind::BasicEventElement,
            ElementKind::SubmodelElementCollection,
            ElementKind::SubmodelElementList,
        ] {
            assert_eq!(ElementKind::parse(kind.as_str()).unwrap(), kind);
        }
    }
}
