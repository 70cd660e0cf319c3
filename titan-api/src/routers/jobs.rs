//! `/jobs` - background job submission and inspection.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use titan_core::TitanError;
use titan_queue::{Job, JobId};

use crate::error::ApiError;
use crate::params::tenant_from_headers;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct SubmitJobRequest {
    task: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    priority: u32,
    max_retries: Option<u32>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(submit_job))
        .route("/jobs/dlq", get(dead_letters))
        .route("/jobs/{job_id}", get(get_job).delete(cancel_job))
}

async fn submit_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SubmitJobRequest>,
) -> Result<Response, ApiError> {
    let ctx = tenant_from_headers(&headers);
    let mut job = Job::new(request.task, request.payload, ctx.tenant_id.as_str())
        .with_priority(request.priority);
    if let Some(max_retries) = request.max_retries {
        job = job.with_max_retries(max_retries);
    }
    let job_id = state.queue.submit(job);
    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"jobId": job_id.to_string()})),
    )
        .into_response())
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    Uuid::parse_str(raw)
        .map(JobId)
        .map_err(|_| ApiError::bad_request("job id must be a UUID"))
}

async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    let job = state
        .queue
        .get(&job_id)
        .ok_or_else(|| ApiError::not_found(format!("job '{job_id}' not found")))?;
    Ok(Json(serde_json::to_value(job).map_err(|e| {
        ApiError(TitanError::internal_from("job serialization failed", e))
    })?))
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    state.queue.cancel(&job_id).map_err(|e| match e {
        titan_queue::QueueError::JobNotFound(_) => ApiError(TitanError::not_found(e.to_string())),
        other => ApiError(TitanError::conflict(other.to_string())),
    })?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn dead_letters(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let jobs = state.queue.dead_letters();
    Ok(Json(serde_json::to_value(jobs).map_err(|e| {
        ApiError(TitanError::internal_from("job serialization failed", e))
    })?))
}
