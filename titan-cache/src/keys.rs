//! Cache key schema.
//!
//! `titan:{aas|sm|cd}:{id_b64}:bytes` / `:etag` for entity pairs and
//! `titan:sm:{id_b64}:elem:{sha256(path)}:value` for element values. The
//! path digest keeps keys bounded regardless of path depth.

use sha2::{Digest, Sha256};

use titan_core::EntityKind;

/// Key builder for the Titan cache namespace.
pub struct CacheKeys;

impl CacheKeys {
    pub const PREFIX: &'static str = "titan";

    fn kind_tag(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Aas => "aas",
            EntityKind::Submodel => "sm",
            EntityKind::ConceptDescription => "cd",
            EntityKind::ShellDescriptor => "aasd",
            EntityKind::SubmodelDescriptor => "smd",
            EntityKind::SubmodelElement => "elem",
            EntityKind::OperationInvocation => "opinv",
        }
    }

    pub fn entity_bytes(kind: EntityKind, id_b64: &str) -> String {
        format!("{}:{}:{}:bytes", Self::PREFIX, Self::kind_tag(kind), id_b64)
    }

    pub fn entity_etag(kind: EntityKind, id_b64: &str) -> String {
        format!("{}:{}:{}:etag", Self::PREFIX, Self::kind_tag(kind), id_b64)
    }

    pub fn element_value(submodel_b64: &str, id_short_path: &str) -> String {
        let digest = Sha256::digest(id_short_path.as_bytes());
        let mut path_hash = String::with_capacity(64);
        for byte in digest {
            path_hash.push_str(&format!("{byte:02x}"));
        }
        format!("{}:sm:{submodel_b64}:elem:{path_hash}:value", Self::PREFIX)
    }

    /// Prefix matching every element-value key of one submodel.
    pub fn element_pattern(submodel_b64: &str) -> String {
        format!("{}:sm:{submodel_b64}:elem:", Self::PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_keys_carry_kind_and_id() {
        assert_eq!(
            CacheKeys::entity_bytes(EntityKind::Aas, "dXJu"),
            "titan:aas:dXJu:bytes"
        );
        assert_eq!(
            CacheKeys::entity_etag(EntityKind::Submodel, "dXJu"),
            "titan:sm:dXJu:etag"
        );
    }

    #[test]
    fn element_keys_match_their_pattern() {
        let key = CacheKeys::element_value("dXJu", "address.city");
        assert!(key.starts_with(&CacheKeys::element_pattern("dXJu")));
        assert!(key.ends_with(":value"));
        // digest makes distinct paths distinct
        assert_ne!(key, CacheKeys::element_value("dXJu", "address.zip"));
    }
}
