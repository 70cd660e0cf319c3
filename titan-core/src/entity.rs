//! Entity kind discriminator shared by cache keys, events and dispatch.

use serde::{Deserialize, Serialize};

/// The identifiable kinds the runtime stores and propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Aas,
    Submodel,
    SubmodelElement,
    ConceptDescription,
    ShellDescriptor,
    SubmodelDescriptor,
    OperationInvocation,
}

impl EntityKind {
    /// Short tag used in cache keys and wire payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aas => "aas",
            Self::Submodel => "submodel",
            Self::SubmodelElement => "submodel_element",
            Self::ConceptDescription => "cd",
            Self::ShellDescriptor => "shell_descriptor",
            Self::SubmodelDescriptor => "submodel_descriptor",
            Self::OperationInvocation => "operation_invocation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "aas" => Some(Self::Aas),
            "submodel" => Some(Self::Submodel),
            "submodel_element" => Some(Self::SubmodelElement),
            "cd" => Some(Self::ConceptDescription),
            "shell_descriptor" => Some(Self::ShellDescriptor),
            "submodel_descriptor" => Some(Self::SubmodelDescriptor),
            "operation_invocation" => Some(Self::OperationInvocation),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
