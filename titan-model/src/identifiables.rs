//! Identifiable entities: shells, submodels, concept descriptions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{AdministrativeInformation, LangString, Qualifier, SpecificAssetId};
use crate::elements::SubmodelElement;
use crate::kinds::{AssetKind, ModellingKind};
use crate::reference::Reference;

fn aas_model_type() -> String {
    "AssetAdministrationShell".to_string()
}

fn submodel_model_type() -> String {
    "Submodel".to_string()
}

fn cd_model_type() -> String {
    "ConceptDescription".to_string()
}

/// Asset meta information carried by a shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssetInformation {
    pub asset_kind: AssetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_asset_ids: Option<Vec<SpecificAssetId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_thumbnail: Option<Value>,
}

/// The top-level IDTA entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssetAdministrationShell {
    #[serde(default = "aas_model_type")]
    pub model_type: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Vec<LangString>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administration: Option<AdministrativeInformation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<Reference>,
    pub asset_information: AssetInformation,
    /// References to Submodel ids that may or may not exist locally.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submodels: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded_data_specifications: Option<Vec<Value>>,
}

/// A Submodel: ordered elements under a semantic id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Submodel {
    #[serde(default = "submodel_model_type")]
    pub model_type: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Vec<LangString>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administration: Option<AdministrativeInformation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ModellingKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplemental_semantic_ids: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifiers: Option<Vec<Qualifier>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submodel_elements: Option<Vec<SubmodelElement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded_data_specifications: Option<Vec<Value>>,
}

impl Submodel {
    pub fn is_template(&self) -> bool {
        self.kind == Some(ModellingKind::Template)
    }
}

/// A concept description, optionally carrying an embedded IEC 61360
/// data specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConceptDescription {
    #[serde(default = "cd_model_type")]
    pub model_type: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Vec<LangString>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administration: Option<AdministrativeInformation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_case_of: Option<Vec<Reference>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded_data_specifications: Option<Vec<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shell_parses_and_defaults_model_type() {
        let shell: AssetAdministrationShell = serde_json::from_value(json!({
            "id": "urn:example:aas:1",
            "idShort": "X",
            "assetInformation": {"assetKind": "Instance",
                                 "globalAssetId": "urn:example:asset:1"}
        }))
        .unwrap();
        assert_eq!(shell.model_type, "AssetAdministrationShell");
        assert_eq!(
            shell.asset_information.global_asset_id.as_deref(),
            Some("urn:example:asset:1")
        );
    }

    #[test]
    fn template_kind_is_detected() {
        let submodel: Submodel = serde_json::from_value(json!({
            "id": "urn:example:sm:1",
            "kind": "Template"
        }))
        .unwrap();
        assert!(submodel.is_template());
    }

    #[test]
    fn submodel_rejects_unknown_fields() {
        let result: Result<Submodel, _> = serde_json::from_value(json!({
            "id": "urn:example:sm:1",
            "mystery": []
        }));
        assert!(result.is_err());
    }
}
