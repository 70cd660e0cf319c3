//! Concept Description repository.

use std::sync::Arc;

use serde_json::Value;

use titan_core::{EntityKind, TenantContext, TitanError, TitanResult};
use titan_events::EventBus;
use titan_model::{validation, ConceptDescription};
use titan_projection::merge_patch;

use crate::repo::{EntityPage, IfMatch, RepoCore};
use crate::store::{DocumentStore, ListFilter};

#[derive(Clone)]
pub struct ConceptDescriptionRepository {
    core: RepoCore,
}

impl ConceptDescriptionRepository {
    pub fn new(store: Arc<dyn DocumentStore>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            core: RepoCore::new(store, bus, EntityKind::ConceptDescription),
        }
    }

    pub async fn create(
        &self,
        ctx: &TenantContext,
        cd: ConceptDescription,
    ) -> TitanResult<(Vec<u8>, String)> {
        validation::validate_concept_description(&cd)?;
        let id = cd.id.clone();
        let doc = to_doc(&cd)?;
        self.core.create(ctx, &id, doc, Vec::new()).await
    }

    pub async fn get(&self, ctx: &TenantContext, id: &str) -> TitanResult<(Vec<u8>, String)> {
        let row = self.core.get(ctx, id).await?;
        Ok((row.doc_bytes, row.etag))
    }

    pub async fn list(
        &self,
        ctx: &TenantContext,
        cursor: Option<&str>,
        limit: Option<usize>,
        filter: &ListFilter,
    ) -> TitanResult<EntityPage> {
        self.core.list(ctx, cursor, limit, filter).await
    }

    pub async fn replace(
        &self,
        ctx: &TenantContext,
        id: &str,
        cd: ConceptDescription,
        if_match: &IfMatch,
    ) -> TitanResult<(Vec<u8>, String)> {
        validation::validate_concept_description(&cd)?;
        if cd.id != id {
            return Err(TitanError::bad_request(
                "body id does not match the addressed identifier",
            ));
        }
        let doc = to_doc(&cd)?;
        self.core
            .replace(ctx, id, doc, if_match, Vec::new(), Vec::new())
            .await
    }

    pub async fn patch(
        &self,
        ctx: &TenantContext,
        id: &str,
        patch: &Value,
        if_match: &IfMatch,
    ) -> TitanResult<(Vec<u8>, String)> {
        let mut doc = self.core.get(ctx, id).await?.doc;
        merge_patch(&mut doc, patch);
        let cd: ConceptDescription = serde_json::from_value(doc).map_err(|e| {
            TitanError::bad_request(format!("patched concept description is invalid: {e}"))
        })?;
        self.replace(ctx, id, cd, if_match).await
    }

    pub async fn delete(
        &self,
        ctx: &TenantContext,
        id: &str,
        if_match: &IfMatch,
    ) -> TitanResult<()> {
        self.core.delete(ctx, id, if_match).await?;
        Ok(())
    }
}

fn to_doc(cd: &ConceptDescription) -> TitanResult<Value> {
    serde_json::to_value(cd)
        .map_err(|e| TitanError::internal_from("concept description serialization failed", e))
}
