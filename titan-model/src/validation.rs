//! Metamodel validation.
//!
//! Enforces the IDTA limits the serde layer cannot express: identifier and
//! idShort grammar, administration version length, list-child addressing,
//! and Blob value structure.

use crate::common::AdministrativeInformation;
use crate::elements::SubmodelElement;
use crate::error::ModelError;
use crate::identifiables::{AssetAdministrationShell, ConceptDescription, Submodel};

/// Maximum identifier length (IDTA-01001).
pub const MAX_ID_LEN: usize = 2000;
/// Maximum idShort length.
pub const MAX_ID_SHORT_LEN: usize = 128;
/// Maximum administration version/revision length.
pub const MAX_VERSION_LEN: usize = 4;

/// Internal blob reference prefix written by the externalizer.
pub const BLOB_REF_PREFIX: &str = "/blobs/";

/// Validate an entity identifier: non-empty UTF-8, at most 2000 bytes.
pub fn validate_identifier(id: &str) -> Result<(), ModelError> {
    if id.is_empty() {
        return Err(ModelError::InvalidIdentifier("identifier is empty".into()));
    }
    if id.len() > MAX_ID_LEN {
        return Err(ModelError::InvalidIdentifier(format!(
            "identifier exceeds {MAX_ID_LEN} bytes"
        )));
    }
    Ok(())
}

/// Validate idShort grammar: `[a-zA-Z_][a-zA-Z0-9_]*`, at most 128 chars.
pub fn validate_id_short(id_short: &str) -> Result<(), ModelError> {
    let invalid = |reason: &str| ModelError::InvalidIdShort {
        id_short: id_short.to_string(),
        reason: reason.to_string(),
    };

    if id_short.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if id_short.len() > MAX_ID_SHORT_LEN {
        return Err(invalid("exceeds 128 characters"));
    }
    let mut chars = id_short.chars();
    let first = chars.next().unwrap();
    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid("must start with a letter or underscore"));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("may contain only letters, digits and underscore"));
    }
    Ok(())
}

fn validate_administration(admin: &AdministrativeInformation) -> Result<(), ModelError> {
    for (field, value) in [("version", &admin.version), ("revision", &admin.revision)] {
        if let Some(v) = value {
            if v.is_empty() || v.len() > MAX_VERSION_LEN {
                return Err(ModelError::invalid_field(
                    format!("administration.{field}"),
                    format!("must be 1..={MAX_VERSION_LEN} characters"),
                ));
            }
        }
    }
    Ok(())
}

/// A Blob `value` must be base64 content or an internal `/blobs/` reference.
fn validate_blob_value(value: &str) -> Result<(), ModelError> {
    if value.starts_with(BLOB_REF_PREFIX) || value.starts_with("data:") {
        return Ok(());
    }
    let base64_ok = value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'\n' | b'\r'));
    if !base64_ok {
        return Err(ModelError::invalid_field(
            "Blob.value",
            "must be base64 content, a data URI, or an internal blob reference",
        ));
    }
    Ok(())
}

/// Validate one element and recurse into its children.
///
/// `in_list` marks direct children of a `SubmodelElementList`, which are
/// addressed by index and must not carry an idShort.
pub fn validate_element(element: &SubmodelElement, in_list: bool) -> Result<(), ModelError> {
    match (in_list, element.id_short()) {
        (true, Some(id_short)) => {
            return Err(ModelError::InvalidIdShort {
                id_short: id_short.to_string(),
                reason: "direct children of a SubmodelElementList are addressed by index \
                         and must not carry an idShort"
                    .to_string(),
            });
        }
        (false, None) => {
            return Err(ModelError::invalid_field(
                "idShort",
                format!("required on {} outside a SubmodelElementList", element.kind().as_str()),
            ));
        }
        (false, Some(id_short)) => validate_id_short(id_short)?,
        (true, None) => {}
    }

    match element {
        SubmodelElement::Blob(blob) => {
            if let Some(value) = &blob.value {
                validate_blob_value(value)?;
            }
        }
        SubmodelElement::SubmodelElementCollection(collection) => {
            for child in collection.value.iter().flatten() {
                validate_element(child, false)?;
            }
        }
        SubmodelElement::SubmodelElementList(list) => {
            for child in list.value.iter().flatten() {
                validate_element(child, true)?;
            }
        }
        SubmodelElement::Entity(entity) => {
            for statement in entity.statements.iter().flatten() {
                validate_element(statement, false)?;
            }
        }
        SubmodelElement::AnnotatedRelationshipElement(rel) => {
            for annotation in rel.annotations.iter().flatten() {
                validate_element(annotation, false)?;
            }
        }
        SubmodelElement::Operation(operation) => {
            for variables in [
                &operation.input_variables,
                &operation.output_variables,
                &operation.inoutput_variables,
            ] {
                for variable in variables.iter().flatten() {
                    validate_element(&variable.value, false)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Validate a full Submodel document.
pub fn validate_submodel(submodel: &Submodel) -> Result<(), ModelError> {
    validate_identifier(&submodel.id)?;
    if let Some(id_short) = &submodel.id_short {
        validate_id_short(id_short)?;
    }
    if let Some(admin) = &submodel.administration {
        validate_administration(admin)?;
    }
    for element in submodel.submodel_elements.iter().flatten() {
        validate_element(element, false)?;
    }
    Ok(())
}

/// Validate a shell document.
pub fn validate_shell(shell: &AssetAdministrationShell) -> Result<(), ModelError> {
    validate_identifier(&shell.id)?;
    if let Some(id_short) = &shell.id_short {
        validate_id_short(id_short)?;
    }
    if let Some(admin) = &shell.administration {
        validate_administration(admin)?;
    }
    for reference in shell.submodels.iter().flatten() {
        for key in &reference.keys {
            validate_identifier(&key.value)?;
        }
    }
    Ok(())
}

/// Validate a concept description.
pub fn validate_concept_description(cd: &ConceptDescription) -> Result<(), ModelError> {
    validate_identifier(&cd.id)?;
    if let Some(id_short) = &cd.id_short {
        validate_id_short(id_short)?;
    }
    if let Some(admin) = &cd.administration {
        validate_administration(admin)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submodel(doc: serde_json::Value) -> Submodel {
        serde_json::from_value(doc).unwrap()
    }

    #[test]
    fn id_short_grammar() {
        assert!(validate_id_short("Temperature").is_ok());
        assert!(validate_id_short("_private9").is_ok());
        assert!(validate_id_short("9starts_with_digit").is_err());
        assert!(validate_id_short("has-dash").is_err());
        assert!(validate_id_short("").is_err());
        assert!(validate_id_short(&"a".repeat(129)).is_err());
    }

    #[test]
    fn identifier_limits() {
        assert!(validate_identifier("urn:example:1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"x".repeat(2001)).is_err());
    }

    #[test]
    fn list_children_must_not_carry_id_short() {
        let sm = submodel(json!({
            "id": "urn:example:sm:1",
            "submodelElements": [{
                "modelType": "SubmodelElementList",
                "idShort": "measurements",
                "value": [{"modelType": "Property", "idShort": "oops",
                           "valueType": "xs:int", "value": "1"}]
            }]
        }));
        assert!(validate_submodel(&sm).is_err());

        let ok = submodel(json!({
            "id": "urn:example:sm:1",
            "submodelElements": [{
                "modelType": "SubmodelElementList",
                "idShort": "measurements",
                "value": [{"modelType": "Property",
                           "valueType": "xs:int", "value": "1"}]
            }]
        }));
        assert!(validate_submodel(&ok).is_ok());
    }

    #[test]
    fn id_short_required_outside_lists() {
        let sm = submodel(json!({
            "id": "urn:example:sm:1",
            "submodelElements": [{"modelType": "Property",
                                  "valueType": "xs:string", "value": "x"}]
        }));
        assert!(validate_submodel(&sm).is_err());
    }

    #[test]
    fn blob_value_structure() {
        let sm = submodel(json!({
            "id": "urn:example:sm:1",
            "submodelElements": [{
                "modelType": "Blob", "idShort": "b",
                "contentType": "application/octet-stream",
                "value": "not base64 at all!!"
            }]
        }));
        assert!(validate_submodel(&sm).is_err());

        for good in ["aGVsbG8=", "/blobs/0c5b7f4e", "data:image/png;base64,aGVsbG8="] {
            let sm = submodel(json!({
                "id": "urn:example:sm:1",
                "submodelElements": [{
                    "modelType": "Blob", "idShort": "b",
                    "contentType": "application/octet-stream",
                    "value": good
                }]
            }));
            assert!(validate_submodel(&sm).is_ok(), "rejected {good}");
        }
    }

    #[test]
    fn administration_version_length() {
        let sm = submodel(json!({
            "id": "urn:example:sm:1",
            "administration": {"version": "10000"}
        }));
        assert!(validate_submodel(&sm).is_err());
    }
}
