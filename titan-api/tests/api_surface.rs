use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use titan_api::auth::AnonymousAccess;
use titan_api::{build_router, AppState};
use titan_blob::{BlobConfig, LocalBlobStore};
use titan_cache::MemoryCache;
use titan_core::Settings;
use titan_events::MemoryEventBus;
use titan_queue::JobQueue;
use titan_repo::MemoryDocumentStore;

fn test_app() -> Router {
    let settings = {
        let mut settings = Settings::from_env();
        settings.enable_rate_limiting = false;
        settings
    };
    let blob_root = std::env::temp_dir()
        .join("titan-api-tests")
        .join(uuid::Uuid::new_v4().to_string());
    let state = AppState::new(
        settings,
        Arc::new(MemoryDocumentStore::new()),
        Arc::new(MemoryCache::default()),
        Arc::new(MemoryEventBus::new(256)),
        Arc::new(LocalBlobStore::new(
            blob_root,
            BlobConfig::default().with_inline_threshold(64),
        )),
        Arc::new(JobQueue::new()),
        Arc::new(AnonymousAccess),
    );
    build_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn shell_body() -> Value {
    json!({
        "id": "urn:example:aas:1",
        "idShort": "X",
        "assetInformation": {"assetKind": "Instance",
                             "globalAssetId": "urn:example:asset:1"}
    })
}

fn submodel_body() -> Value {
    json!({
        "id": "urn:example:sm:1",
        "idShort": "Nameplate",
        "submodelElements": [
            {"modelType": "SubmodelElementCollection", "idShort": "address",
             "value": [{"modelType": "Property", "idShort": "city",
                        "valueType": "xs:string", "value": "Boston"}]},
            {"modelType": "SubmodelElementList", "idShort": "measurements",
             "value": []}
        ]
    })
}

/// S1: POST /shells returns 201 with Location and ETag; a GET with
/// If-None-Match equal to that ETag returns 304.
#[tokio::test]
async fn create_get_roundtrip_with_conditional_get() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(post_json("/shells", shell_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()["location"].to_str().unwrap().to_string();
    assert_eq!(location, "/shells/dXJuOmV4YW1wbGU6YWFzOjE");
    let etag = response.headers()["etag"].to_str().unwrap().to_string();
    assert!(etag.starts_with('"') && etag.ends_with('"'));

    let response = app
        .clone()
        .oneshot(Request::get(location.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["etag"].to_str().unwrap(), etag);
    let body = body_json(response).await;
    assert_eq!(body["id"], "urn:example:aas:1");

    let response = app
        .oneshot(
            Request::get(location.as_str())
                .header("if-none-match", &etag)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn duplicate_create_returns_conflict_envelope() {
    let app = test_app();
    app.clone()
        .oneshot(post_json("/shells", shell_body()))
        .await
        .unwrap();
    let response = app
        .oneshot(post_json("/shells", shell_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["messages"][0]["code"], "Conflict");
    assert_eq!(body["messages"][0]["messageType"], "Error");
    assert!(body["messages"][0]["timestamp"].is_string());
}

#[tokio::test]
async fn invalid_identifier_segment_is_400_invalid_base64url() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::get("/shells/not%2Bbase64url!!")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["messages"][0]["code"], "InvalidBase64Url");
}

/// S3: navigation plus content=value collapses a Property to its value.
#[tokio::test]
async fn element_value_projection() {
    let app = test_app();
    app.clone()
        .oneshot(post_json("/submodels", submodel_body()))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::get("/submodels/dXJuOmV4YW1wbGU6c206MQ/submodel-elements/address.city?content=value")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!("Boston"));
}

/// S4: creating under a list returns a Location ending in `[0]`.
#[tokio::test]
async fn list_creation_synthesizes_index_location() {
    let app = test_app();
    app.clone()
        .oneshot(post_json("/submodels", submodel_body()))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/submodels/dXJuOmV4YW1wbGU6c206MQ/submodel-elements/measurements",
            json!({"modelType": "Property", "valueType": "xs:int", "value": "7"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()["location"].to_str().unwrap();
    assert!(location.ends_with("measurements[0]"), "location {location}");

    let response = app
        .oneshot(Request::get(location).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["value"], "7");
}

/// S5: optimistic concurrency over the HTTP surface.
#[tokio::test]
async fn stale_if_match_gets_412() {
    let app = test_app();
    let response = app
        .clone()
        .oneshot(post_json("/shells", shell_body()))
        .await
        .unwrap();
    let etag = response.headers()["etag"].to_str().unwrap().to_string();

    let updated = {
        let mut body = shell_body();
        body["idShort"] = json!("Y");
        body
    };
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/shells/dXJuOmV4YW1wbGU6YWFzOjE")
                .header("content-type", "application/json")
                .header("if-match", &etag)
                .body(Body::from(updated.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let new_etag = response.headers()["etag"].to_str().unwrap().to_string();
    assert_ne!(new_etag, etag);

    // second writer replays the stale ETag
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/shells/dXJuOmV4YW1wbGU6YWFzOjE")
                .header("content-type", "application/json")
                .header("if-match", &etag)
                .body(Body::from(shell_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    let body = body_json(response).await;
    assert_eq!(body["messages"][0]["code"], "PreconditionFailed");

    let response = app
        .oneshot(
            Request::get("/shells/dXJuOmV4YW1wbGU6YWFzOjE")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()["etag"].to_str().unwrap(),
        new_etag
    );
}

#[tokio::test]
async fn value_patch_and_projection_agree() {
    let app = test_app();
    app.clone()
        .oneshot(post_json("/submodels", submodel_body()))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/submodels/dXJuOmV4YW1wbGU6c206MQ/submodel-elements/address.city/$value")
                .header("content-type", "application/json")
                .body(Body::from(json!("Cambridge").to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::get(
                "/submodels/dXJuOmV4YW1wbGU6c206MQ/submodel-elements/address.city?content=value",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!("Cambridge"));
}

#[tokio::test]
async fn operation_invocation_creates_pending_record() {
    let app = test_app();
    let submodel = json!({
        "id": "urn:example:sm:op",
        "submodelElements": [{
            "modelType": "Operation", "idShort": "calibrate",
            "inputVariables": [
                {"value": {"modelType": "Property", "idShort": "speed",
                           "valueType": "xs:int"}}
            ]
        }]
    });
    app.clone()
        .oneshot(post_json("/submodels", submodel))
        .await
        .unwrap();

    let sm_b64 = titan_core::encode_id("urn:example:sm:op");
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/submodels/{sm_b64}/submodel-elements/calibrate/invoke"),
            json!({"inputArguments": [{"idShort": "speed", "value": 100}]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["execution_state"], "PENDING");
    let invocation_id = body["invocation_id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::get(format!(
                "/submodels/{sm_b64}/submodel-elements/calibrate/operation-status/{invocation_id}"
            ))
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // unknown argument names are rejected
    let response = app
        .oneshot(post_json(
            &format!("/submodels/{sm_b64}/submodel-elements/calibrate/invoke"),
            json!({"inputArguments": [{"idShort": "torque", "value": 1}]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn discovery_lookup_by_global_asset_id() {
    let app = test_app();
    app.clone()
        .oneshot(post_json("/shells", shell_body()))
        .await
        .unwrap();

    let encoded = titan_repo::encode_asset_id("globalAssetId", "urn:example:asset:1");
    let response = app
        .oneshot(
            Request::get(format!("/lookup/shells?assetIds={encoded}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["result"], json!(["urn:example:aas:1"]));
}

#[tokio::test]
async fn description_advertises_contract() {
    let app = test_app();
    let response = app
        .oneshot(Request::get("/description").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["profiles"].as_array().unwrap().len() >= 4);
    assert_eq!(body["pagination"]["defaultLimit"], 100);
    assert_eq!(body["pagination"]["maxLimit"], 1000);
    assert_eq!(body["templateInstantiation"]["blobPolicy"], "copy-on-instantiate");
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = test_app();
    let response = app
        .clone()
        .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// S6 (surface half): a large inline Blob is externalized and the
/// attachment endpoint streams the original bytes back.
#[tokio::test]
async fn blob_externalization_and_attachment_roundtrip() {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let app = test_app();
    let payload = vec![0x5Au8; 512];
    let submodel = json!({
        "id": "urn:example:sm:blob",
        "submodelElements": [{
            "modelType": "Blob", "idShort": "firmware",
            "contentType": "application/octet-stream",
            "value": STANDARD.encode(&payload)
        }]
    });
    app.clone()
        .oneshot(post_json("/submodels", submodel))
        .await
        .unwrap();

    let sm_b64 = titan_core::encode_id("urn:example:sm:blob");
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/submodels/{sm_b64}/submodel-elements/firmware"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let element = body_json(response).await;
    let stored = element["value"].as_str().unwrap();
    assert!(stored.starts_with("/blobs/"), "value is {stored}");

    let response = app
        .clone()
        .oneshot(
            Request::get(format!(
                "/submodels/{sm_b64}/submodel-elements/firmware/attachment"
            ))
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), payload.as_slice());

    // the /blobs/{id} reference resolves directly too
    let response = app
        .oneshot(Request::get(stored).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), payload.as_slice());
}

#[tokio::test]
async fn serialization_export_includes_created_entities() {
    let app = test_app();
    app.clone()
        .oneshot(post_json("/shells", shell_body()))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json("/submodels", submodel_body()))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::get("/serialization").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["assetAdministrationShells"].as_array().unwrap().len(), 1);
    assert_eq!(body["submodels"].as_array().unwrap().len(), 1);
    assert_eq!(body["conceptDescriptions"].as_array().unwrap().len(), 0);
}
