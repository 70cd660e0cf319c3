//! Sliding-window rate limiter.
//!
//! Window counters live in the cache tier, keyed by client IP or bearer
//! token hash. When the cache is unreachable the limiter fails open: a
//! request is never rejected because the limiter's backend is down.

use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use tracing::warn;

use titan_core::TitanError;

use crate::error::ApiError;
use crate::state::AppState;

fn client_key(request: &Request) -> String {
    if let Some(bearer) = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        let digest = Sha256::digest(bearer.as_bytes());
        return format!("titan:ratelimit:token:{:02x}{:02x}{:02x}{:02x}",
                       digest[0], digest[1], digest[2], digest[3]);
    }

    let ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<std::net::SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());
    format!("titan:ratelimit:ip:{ip}")
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let settings = &state.settings;
    if !settings.enable_rate_limiting {
        return Ok(next.run(request).await);
    }

    let key = client_key(&request);
    let window = Duration::from_secs(settings.rate_limit_window_secs);
    match state.cache.increment(&key, window).await {
        Ok(count) if count > u64::from(settings.rate_limit_requests) => {
            Err(ApiError(TitanError::too_many_requests(format!(
                "rate limit of {} requests per {}s exceeded",
                settings.rate_limit_requests, settings.rate_limit_window_secs
            ))))
        }
        Ok(_) => Ok(next.run(request).await),
        Err(error) => {
            // fail open on cache unavailability
            warn!(%error, "rate limiter degraded; allowing request");
            Ok(next.run(request).await)
        }
    }
}
