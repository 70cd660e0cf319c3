//! Health endpoints.
//!
//! Liveness answers while the process runs; readiness requires the
//! repository and cache to probe healthy; the full report adds the blob
//! store and event bus. Every probe runs under its own short deadline.

use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::state::AppState;

const PROBE_DEADLINE: Duration = Duration::from_secs(2);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .route("/health", get(full))
}

async fn live() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn probe_store(state: &AppState) -> bool {
    timeout(PROBE_DEADLINE, state.store.health_check())
        .await
        .unwrap_or(false)
}

async fn probe_cache(state: &AppState) -> bool {
    timeout(PROBE_DEADLINE, state.cache.health_check())
        .await
        .unwrap_or(false)
}

async fn probe_blob_store(state: &AppState) -> bool {
    timeout(PROBE_DEADLINE, state.blob_store.health_check())
        .await
        .unwrap_or(false)
}

async fn probe_bus(state: &AppState) -> bool {
    timeout(PROBE_DEADLINE, state.bus.health_check())
        .await
        .unwrap_or(false)
}

async fn ready(State(state): State<AppState>) -> Response {
    let store_ok = probe_store(&state).await;
    let cache_ok = probe_cache(&state).await;
    if store_ok && cache_ok {
        (StatusCode::OK, Json(json!({"status": "ready"}))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not ready",
                "repository": store_ok,
                "cache": cache_ok,
            })),
        )
            .into_response()
    }
}

async fn full(State(state): State<AppState>) -> Json<Value> {
    let store_ok = probe_store(&state).await;
    let cache_ok = probe_cache(&state).await;
    let blob_ok = probe_blob_store(&state).await;
    let bus_ok = probe_bus(&state).await;
    let uptime = (Utc::now() - state.started_at).num_seconds();
    let queue = state.queue.stats();

    let healthy = store_ok && cache_ok && blob_ok && bus_ok;
    Json(json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "uptimeSeconds": uptime,
        "instanceId": state.settings.instance_id,
        "dependencies": {
            "repository": store_ok,
            "cache": cache_ok,
            "blobStore": blob_ok,
            "eventBus": bus_ok,
        },
        "queue": queue,
        "websocketSubscribers": state.ws_hub.subscriber_count(),
    }))
}
