//! Registry descriptors.
//!
//! Descriptors advertise endpoints for shells and submodels that are not
//! necessarily hosted locally; they share identification attributes with
//! the entities they describe.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{AdministrativeInformation, LangString, SpecificAssetId};
use crate::kinds::AssetKind;
use crate::reference::Reference;

/// Protocol-level connection information of an endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProtocolInformation {
    pub href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_protocol_version: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subprotocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subprotocol_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subprotocol_body_encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_attributes: Option<Vec<Value>>,
}

/// A named interface of a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Endpoint {
    pub interface: String,
    pub protocol_information: ProtocolInformation,
}

/// Registry record for a Submodel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubmodelDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Vec<LangString>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administration: Option<AdministrativeInformation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_id: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplemental_semantic_id: Option<Vec<Reference>>,
    pub endpoints: Vec<Endpoint>,
}

/// Registry record for an Asset Administration Shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssetAdministrationShellDescriptor {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<Vec<LangString>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<LangString>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administration: Option<AdministrativeInformation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_kind: Option<AssetKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specific_asset_ids: Option<Vec<SpecificAssetId>>,
    pub endpoints: Vec<Endpoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submodel_descriptors: Option<Vec<SubmodelDescriptor>>,
}
