use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;

use titan_blob::{BlobConfig, BlobStore, LocalBlobStore};
use titan_core::{etag_hex, TenantContext};
use titan_events::{EventBus, MemoryEventBus};
use titan_model::{AssetAdministrationShell, Submodel};
use titan_repo::{
    encode_asset_id, AssetIdFilter, ConceptDescriptionRepository, DiscoveryService, DocumentStore,
    IfMatch, InstantiationRequest, ListFilter, MemoryDocumentStore, ShellRepository,
    SubmodelRepository,
};

struct Fixture {
    store: Arc<MemoryDocumentStore>,
    blob_store: Arc<LocalBlobStore>,
    shells: ShellRepository,
    submodels: SubmodelRepository,
    cds: ConceptDescriptionRepository,
    discovery: DiscoveryService,
    ctx: TenantContext,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryDocumentStore::new());
    let bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::new(256));
    let blob_root = std::env::temp_dir()
        .join("titan-repo-tests")
        .join(uuid::Uuid::new_v4().to_string());
    let blob_store = Arc::new(LocalBlobStore::new(
        blob_root,
        BlobConfig::default().with_inline_threshold(64),
    ));
    Fixture {
        shells: ShellRepository::new(store.clone(), bus.clone()),
        submodels: SubmodelRepository::new(store.clone(), bus.clone(), blob_store.clone()),
        cds: ConceptDescriptionRepository::new(store.clone(), bus.clone()),
        discovery: DiscoveryService::new(store.clone()),
        store,
        blob_store,
        ctx: TenantContext::default(),
    }
}

fn shell(id: &str, global_asset_id: &str) -> AssetAdministrationShell {
    serde_json::from_value(json!({
        "id": id,
        "idShort": "Pump",
        "assetInformation": {
            "assetKind": "Instance",
            "globalAssetId": global_asset_id,
            "specificAssetIds": [{"name": "serial", "value": "SN-42"}]
        }
    }))
    .unwrap()
}

fn submodel(id: &str) -> Submodel {
    serde_json::from_value(json!({
        "id": id,
        "idShort": "Nameplate",
        "kind": "Instance",
        "semanticId": {"type": "ExternalReference",
                       "keys": [{"type": "GlobalReference",
                                 "value": "urn:example:semantic:nameplate"}]},
        "submodelElements": [
            {"modelType": "SubmodelElementCollection", "idShort": "address",
             "value": [{"modelType": "Property", "idShort": "city",
                        "valueType": "xs:string", "value": "Boston"}]},
            {"modelType": "SubmodelElementList", "idShort": "measurements",
             "value": [{"modelType": "Property", "valueType": "xs:int", "value": "1"}]}
        ]
    }))
    .unwrap()
}

/// Invariant 1: etag == first16hex(sha256(canonical_bytes)) and the
/// canonical bytes re-canonicalize to themselves.
#[tokio::test]
async fn create_yields_canonical_bytes_and_etag() {
    let f = fixture();
    let (bytes, etag) = f
        .shells
        .create(&f.ctx, shell("urn:example:aas:1", "urn:example:asset:1"))
        .await
        .unwrap();

    assert_eq!(etag, etag_hex(&bytes));
    let reparsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(titan_core::canonicalize(&reparsed).unwrap(), bytes);

    let (fetched, fetched_etag) = f.shells.get(&f.ctx, "urn:example:aas:1").await.unwrap();
    assert_eq!(fetched, bytes);
    assert_eq!(fetched_etag, etag);
}

#[tokio::test]
async fn duplicate_create_conflicts() {
    let f = fixture();
    f.shells
        .create(&f.ctx, shell("urn:example:aas:1", "urn:a"))
        .await
        .unwrap();
    let err = f
        .shells
        .create(&f.ctx, shell("urn:example:aas:1", "urn:a"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "Conflict");
}

/// Invariant 8: conditional requests are the linearization point.
#[tokio::test]
async fn if_match_gates_concurrent_writers() {
    let f = fixture();
    let (_, etag) = f
        .shells
        .create(&f.ctx, shell("urn:example:aas:1", "urn:a"))
        .await
        .unwrap();

    // writer A succeeds with the ETag it read
    let (_, new_etag) = f
        .shells
        .replace(
            &f.ctx,
            "urn:example:aas:1",
            shell("urn:example:aas:1", "urn:b"),
            &IfMatch::Exact(etag.clone()),
        )
        .await
        .unwrap();
    assert_ne!(new_etag, etag);

    // writer B raced with the stale ETag and gets 412; state unchanged
    let err = f
        .shells
        .replace(
            &f.ctx,
            "urn:example:aas:1",
            shell("urn:example:aas:1", "urn:c"),
            &IfMatch::Exact(etag),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "PreconditionFailed");
    let (_, current) = f.shells.get(&f.ctx, "urn:example:aas:1").await.unwrap();
    assert_eq!(current, new_etag);
}

/// Invariant 3: create + delete leaves no row and no blob rows.
#[tokio::test]
async fn delete_cascades_blobs() {
    let f = fixture();
    let payload = vec![7u8; 256];
    let sm: Submodel = serde_json::from_value(json!({
        "id": "urn:example:sm:blob",
        "submodelElements": [{
            "modelType": "Blob", "idShort": "firmware",
            "contentType": "application/octet-stream",
            "value": STANDARD.encode(&payload)
        }]
    }))
    .unwrap();

    f.submodels.create(&f.ctx, sm).await.unwrap();

    let doc = f.submodels.get_doc(&f.ctx, "urn:example:sm:blob").await.unwrap();
    let stored_value = doc["submodelElements"][0]["value"].as_str().unwrap();
    assert!(stored_value.starts_with("/blobs/"), "value is {stored_value}");

    let rows = f
        .store
        .blob_rows_for_submodel(&f.ctx, "urn:example:sm:blob")
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(f.blob_store.exists(&rows[0]).await.unwrap());
    let roundtrip = f.blob_store.retrieve(&rows[0]).await.unwrap();
    assert_eq!(roundtrip.as_ref(), payload.as_slice());

    f.submodels
        .delete(&f.ctx, "urn:example:sm:blob", &IfMatch::Any)
        .await
        .unwrap();

    assert!(f.submodels.get(&f.ctx, "urn:example:sm:blob").await.is_err());
    assert!(f
        .store
        .blob_rows_for_submodel(&f.ctx, "urn:example:sm:blob")
        .await
        .unwrap()
        .is_empty());
    assert!(!f.blob_store.exists(&rows[0]).await.unwrap());
}

#[tokio::test]
async fn element_get_create_patch_delete() {
    let f = fixture();
    f.submodels
        .create(&f.ctx, submodel("urn:example:sm:1"))
        .await
        .unwrap();

    // invariant 6: navigation equals element get
    let element = f
        .submodels
        .get_element(&f.ctx, "urn:example:sm:1", "address.city")
        .await
        .unwrap();
    assert_eq!(element["value"], "Boston");

    // S4: creating under a list yields a synthesized index location
    let created = f
        .submodels
        .create_element(
            &f.ctx,
            "urn:example:sm:1",
            "measurements",
            serde_json::from_value(json!({"modelType": "Property",
                                          "valueType": "xs:int", "value": "2"}))
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created.id_short_path, "measurements[1]");
    let fetched = f
        .submodels
        .get_element(&f.ctx, "urn:example:sm:1", "measurements[1]")
        .await
        .unwrap();
    assert_eq!(fetched["value"], "2");

    // value-only patch
    f.submodels
        .patch_element_value(&f.ctx, "urn:example:sm:1", "address.city", &json!("Cambridge"))
        .await
        .unwrap();
    let patched = f
        .submodels
        .get_element(&f.ctx, "urn:example:sm:1", "address.city")
        .await
        .unwrap();
    assert_eq!(patched["value"], "Cambridge");

    // delete removes the subtree
    f.submodels
        .delete_element(&f.ctx, "urn:example:sm:1", "address.city")
        .await
        .unwrap();
    assert!(f
        .submodels
        .get_element(&f.ctx, "urn:example:sm:1", "address.city")
        .await
        .is_err());
}

#[tokio::test]
async fn element_mutations_bump_the_submodel_etag() {
    let f = fixture();
    let (_, etag_before) = {
        f.submodels
            .create(&f.ctx, submodel("urn:example:sm:1"))
            .await
            .unwrap()
    };
    let (_, etag_after) = f
        .submodels
        .patch_element_value(&f.ctx, "urn:example:sm:1", "address.city", &json!("Berlin"))
        .await
        .unwrap();
    assert_ne!(etag_before, etag_after);
}

#[tokio::test]
async fn replace_element_requires_same_variant() {
    let f = fixture();
    f.submodels
        .create(&f.ctx, submodel("urn:example:sm:1"))
        .await
        .unwrap();

    let err = f
        .submodels
        .replace_element(
            &f.ctx,
            "urn:example:sm:1",
            "address.city",
            serde_json::from_value(json!({"modelType": "Capability", "idShort": "city"}))
                .unwrap(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "BadRequest");
}

#[tokio::test]
async fn blob_value_patch_is_rejected() {
    let f = fixture();
    let sm: Submodel = serde_json::from_value(json!({
        "id": "urn:example:sm:blob",
        "submodelElements": [{
            "modelType": "Blob", "idShort": "b",
            "contentType": "application/octet-stream",
            "value": STANDARD.encode(b"tiny")
        }]
    }))
    .unwrap();
    f.submodels.create(&f.ctx, sm).await.unwrap();

    let err = f
        .submodels
        .patch_element_value(&f.ctx, "urn:example:sm:blob", "b", &json!("bmV3"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "BadRequest");
}

#[tokio::test]
async fn listing_pages_are_stable() {
    let f = fixture();
    for index in 0..5 {
        f.cds
            .create(
                &f.ctx,
                serde_json::from_value(json!({"id": format!("urn:example:cd:{index}")})).unwrap(),
            )
            .await
            .unwrap();
    }

    let first = f
        .cds
        .list(&f.ctx, None, Some(2), &ListFilter::default())
        .await
        .unwrap();
    assert_eq!(first.items.len(), 2);
    let cursor = first.next_cursor.expect("more pages");

    let second = f
        .cds
        .list(&f.ctx, Some(&cursor), Some(2), &ListFilter::default())
        .await
        .unwrap();
    assert_eq!(second.items.len(), 2);
    assert!(second.next_cursor.is_some());

    let third = f
        .cds
        .list(
            &f.ctx,
            second.next_cursor.as_deref(),
            Some(2),
            &ListFilter::default(),
        )
        .await
        .unwrap();
    assert_eq!(third.items.len(), 1);
    assert!(third.next_cursor.is_none());

    // no overlap across pages
    let mut all: Vec<String> = first
        .items
        .iter()
        .chain(second.items.iter())
        .chain(third.items.iter())
        .map(|(_, etag)| etag.clone())
        .collect();
    all.dedup();
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn discovery_matches_global_and_specific_ids() {
    let f = fixture();
    f.shells
        .create(&f.ctx, shell("urn:example:aas:1", "urn:example:asset:1"))
        .await
        .unwrap();
    f.shells
        .create(&f.ctx, shell("urn:example:aas:2", "urn:example:asset:2"))
        .await
        .unwrap();

    let by_global =
        AssetIdFilter::decode(&encode_asset_id("globalAssetId", "urn:example:asset:1")).unwrap();
    let hits = f.discovery.lookup_shells(&f.ctx, &[by_global]).await.unwrap();
    assert_eq!(hits, vec!["urn:example:aas:1".to_string()]);

    // specific asset id matches both shells (union, deduplicated)
    let by_serial = AssetIdFilter::decode(&encode_asset_id("serial", "SN-42")).unwrap();
    let hits = f.discovery.lookup_shells(&f.ctx, &[by_serial]).await.unwrap();
    assert_eq!(hits.len(), 2);

    let submodel_hits = f
        .discovery
        .lookup_submodels(&f.ctx, "urn:example:semantic:nameplate")
        .await
        .unwrap();
    assert!(submodel_hits.is_empty());
    f.submodels
        .create(&f.ctx, submodel("urn:example:sm:1"))
        .await
        .unwrap();
    let submodel_hits = f
        .discovery
        .lookup_submodels(&f.ctx, "urn:example:semantic:nameplate")
        .await
        .unwrap();
    assert_eq!(submodel_hits, vec!["urn:example:sm:1".to_string()]);
}

#[tokio::test]
async fn tenants_are_isolated() {
    let f = fixture();
    let other = TenantContext::new("acme");
    f.shells
        .create(&f.ctx, shell("urn:example:aas:1", "urn:a"))
        .await
        .unwrap();

    assert!(f.shells.get(&other, "urn:example:aas:1").await.is_err());
    // same id can exist in another tenant
    f.shells
        .create(&other, shell("urn:example:aas:1", "urn:a"))
        .await
        .unwrap();
}

#[tokio::test]
async fn template_instantiation_copies_structure_and_blobs() {
    let f = fixture();
    let payload = vec![9u8; 256];
    let template: Submodel = serde_json::from_value(json!({
        "id": "urn:example:sm:template",
        "kind": "Template",
        "semanticId": {"type": "ExternalReference",
                       "keys": [{"type": "GlobalReference", "value": "urn:sem:t"}]},
        "submodelElements": [
            {"modelType": "Property", "idShort": "setpoint",
             "valueType": "xs:double", "value": "0"},
            {"modelType": "Blob", "idShort": "firmware",
             "contentType": "application/octet-stream",
             "value": STANDARD.encode(&payload)},
            {"modelType": "File", "idShort": "manual",
             "contentType": "application/pdf",
             "value": format!("data:application/pdf;base64,{}", STANDARD.encode(&payload))}
        ]
    }))
    .unwrap();
    f.submodels.create(&f.ctx, template).await.unwrap();

    let request = InstantiationRequest {
        new_id: "urn:example:sm:instance".to_string(),
        id_short: Some("PumpInstance".to_string()),
        value_overrides: serde_json::from_value(json!({"setpoint": "42.5"})).unwrap(),
        copy_semantic_id: true,
    };
    f.submodels
        .instantiate(&f.ctx, "urn:example:sm:template", &request)
        .await
        .unwrap();

    let instance = f
        .submodels
        .get_doc(&f.ctx, "urn:example:sm:instance")
        .await
        .unwrap();
    assert_eq!(instance["kind"], "Instance");
    assert_eq!(instance["idShort"], "PumpInstance");
    assert_eq!(instance["submodelElements"][0]["value"], "42.5");
    assert_eq!(instance["semanticId"]["keys"][0]["value"], "urn:sem:t");
    // both binary elements end up as fresh references, not inline content
    for index in [1, 2] {
        let value = instance["submodelElements"][index]["value"].as_str().unwrap();
        assert!(value.starts_with("/blobs/"), "value is {value}");
    }

    // copy-on-instantiate: the instance owns its own rows for Blob and File
    let instance_blobs = f
        .store
        .blob_rows_for_submodel(&f.ctx, "urn:example:sm:instance")
        .await
        .unwrap();
    assert_eq!(instance_blobs.len(), 2);
    let template_blobs = f
        .store
        .blob_rows_for_submodel(&f.ctx, "urn:example:sm:template")
        .await
        .unwrap();
    assert_eq!(template_blobs.len(), 2);
    for instance_blob in &instance_blobs {
        assert!(template_blobs.iter().all(|t| t.id != instance_blob.id));
    }

    // deleting the template leaves the instance blobs intact
    f.submodels
        .delete(&f.ctx, "urn:example:sm:template", &IfMatch::Any)
        .await
        .unwrap();
    for instance_blob in &instance_blobs {
        assert!(f.blob_store.exists(instance_blob).await.unwrap());
        let content = f.blob_store.retrieve(instance_blob).await.unwrap();
        assert_eq!(content.as_ref(), payload.as_slice());
    }
}

#[tokio::test]
async fn instantiate_rejects_non_templates() {
    let f = fixture();
    f.submodels
        .create(&f.ctx, submodel("urn:example:sm:1"))
        .await
        .unwrap();
    let request = InstantiationRequest {
        new_id: "urn:example:sm:copy".to_string(),
        id_short: None,
        value_overrides: serde_json::Map::new(),
        copy_semantic_id: true,
    };
    let err = f
        .submodels
        .instantiate(&f.ctx, "urn:example:sm:1", &request)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "BadRequest");
}
