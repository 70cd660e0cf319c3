//! Discovery lookups over the indexed filter columns.

use std::collections::BTreeSet;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use titan_core::{EntityKind, TenantContext, TitanError, TitanResult};

use crate::store::{DocumentStore, ListFilter};

/// One decoded `assetIds` query entry: a base64url-JSON `{name, value}`
/// pair where the name `globalAssetId` addresses the global id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetIdFilter {
    pub name: String,
    pub value: String,
}

impl AssetIdFilter {
    /// Decode one `assetIds` query parameter.
    pub fn decode(encoded: &str) -> TitanResult<Self> {
        let raw = URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('=').as_bytes())
            .map_err(|_| TitanError::invalid_base64url("assetIds entry is not base64url"))?;
        serde_json::from_slice(&raw)
            .map_err(|e| TitanError::bad_request(format!("assetIds entry is not valid JSON: {e}")))
    }

    fn is_global(&self) -> bool {
        self.name == "globalAssetId"
    }
}

/// Lookup service backed by the repository indexes.
#[derive(Clone)]
pub struct DiscoveryService {
    store: Arc<dyn DocumentStore>,
}

impl DiscoveryService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Shell ids matching any of the given asset id filters (union).
    pub async fn lookup_shells(
        &self,
        ctx: &TenantContext,
        filters: &[AssetIdFilter],
    ) -> TitanResult<Vec<String>> {
        let page = self
            .store
            .list(EntityKind::Aas, ctx, None, 100_000, &ListFilter::default())
            .await?;

        let mut matches = BTreeSet::new();
        for row in &page.rows {
            for filter in filters {
                let hit = if filter.is_global() {
                    row.global_asset_id.as_deref() == Some(filter.value.as_str())
                } else {
                    row.specific_asset_ids
                        .iter()
                        .any(|(name, value)| name == &filter.name && value == &filter.value)
                };
                if hit {
                    matches.insert(row.id.clone());
                    break;
                }
            }
        }
        Ok(matches.into_iter().collect())
    }

    /// Submodel ids carrying the given semantic id.
    pub async fn lookup_submodels(
        &self,
        ctx: &TenantContext,
        semantic_id: &str,
    ) -> TitanResult<Vec<String>> {
        let filter = ListFilter {
            semantic_id: Some(semantic_id.to_string()),
            ..ListFilter::default()
        };
        let page = self
            .store
            .list(EntityKind::Submodel, ctx, None, 100_000, &filter)
            .await?;
        Ok(page.rows.into_iter().map(|row| row.id).collect())
    }
}

/// Encode an asset id pair the way clients send it (test helper and
/// serialization counterpart of [`AssetIdFilter::decode`]).
pub fn encode_asset_id(name: &str, value: &str) -> String {
    let json = Value::Object(
        [
            ("name".to_string(), Value::String(name.to_string())),
            ("value".to_string(), Value::String(value.to_string())),
        ]
        .into_iter()
        .collect(),
    );
    URL_SAFE_NO_PAD.encode(json.to_string())
}
