//! # titan-model
//!
//! Typed AAS metamodel (IDTA-01001 Part 1 v3.1.2): identifiable entities,
//! the polymorphic `SubmodelElement` union, references and registry
//! descriptors.
//!
//! Parsing is strict: the `modelType` discriminator selects the variant,
//! unknown fields are rejected, and [`validation`] enforces the metamodel
//! limits (identifier/idShort grammar and lengths, list-child addressing,
//! Blob value structure). External JSON is camelCase throughout.

pub mod common;
pub mod descriptors;
pub mod elements;
pub mod error;
pub mod identifiables;
pub mod kinds;
pub mod reference;
pub mod validation;

pub use common::{AdministrativeInformation, LangString, Qualifier, SpecificAssetId};
pub use descriptors::{
    AssetAdministrationShellDescriptor, Endpoint, ProtocolInformation, SubmodelDescriptor,
};
pub use elements::{
    AnnotatedRelationshipElement, BasicEventElement, Blob, Capability, Entity, File,
    MultiLanguageProperty, Operation, OperationVariable, Property, Range, ReferenceElement,
    RelationshipElement, SubmodelElement, SubmodelElementCollection, SubmodelElementList,
};
pub use error::ModelError;
pub use identifiables::{
    AssetAdministrationShell, AssetInformation, ConceptDescription, Submodel,
};
pub use kinds::{AssetKind, ElementKind, EntityType, ModellingKind};
pub use reference::{Key, KeyType, Reference, ReferenceType};
