//! `GET /description` - service self-description (SSP profiles,
//! supported modifiers, pagination contract, event transports).

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use titan_repo::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/description", get(description))
}

async fn description(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "profiles": [
            "https://admin-shell.io/aas/API/3/1/AssetAdministrationShellRepositoryServiceSpecification/SSP-001",
            "https://admin-shell.io/aas/API/3/1/SubmodelRepositoryServiceSpecification/SSP-001",
            "https://admin-shell.io/aas/API/3/1/SubmodelRepositoryServiceSpecification/SSP-003",
            "https://admin-shell.io/aas/API/3/1/SubmodelRepositoryServiceSpecification/SSP-004",
            "https://admin-shell.io/aas/API/3/1/ConceptDescriptionServiceSpecification/SSP-001",
            "https://admin-shell.io/aas/API/3/1/AssetAdministrationShellRegistryServiceSpecification/SSP-001",
            "https://admin-shell.io/aas/API/3/1/SubmodelRegistryServiceSpecification/SSP-001",
            "https://admin-shell.io/aas/API/3/1/DiscoveryServiceSpecification/SSP-001"
        ],
        "modifiers": ["$value", "$metadata", "$reference", "$path"],
        "pagination": {
            "cursor": "opaque",
            "defaultLimit": DEFAULT_PAGE_LIMIT,
            "maxLimit": MAX_PAGE_LIMIT
        },
        "serializationFormats": ["json"],
        "eventTransports": ["websocket", "mqtt"],
        "templateInstantiation": {
            // shared template blobs are re-stored per instance
            "blobPolicy": "copy-on-instantiate"
        },
        "instanceId": state.settings.instance_id,
    }))
}
