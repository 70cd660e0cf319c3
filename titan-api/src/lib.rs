//! # titan-api
//!
//! Maps the IDTA-01002 Part 2 HTTP surface onto the repository,
//! projection and pipeline crates. The dispatcher decodes Base64URL path
//! identifiers, parses the query modifiers, handles conditional requests
//! (`If-None-Match`/`If-Match`), serializes every failure as the IDTA
//! `Result` envelope, and streams blob attachments.

pub mod auth;
pub mod error;
pub mod params;
pub mod rate_limit;
pub mod routers;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use state::AppState;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Build the full application router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routers::shells::router())
        .merge(routers::submodels::router())
        .merge(routers::concept_descriptions::router())
        .merge(routers::descriptors::router())
        .merge(routers::discovery::router())
        .merge(routers::blobs::router())
        .merge(routers::serialization::router())
        .merge(routers::description::router())
        .merge(routers::health::router())
        .merge(routers::jobs::router())
        .merge(ws::router());

    let rate_limited = api.layer(axum::middleware::from_fn_with_state(
        state.clone(),
        rate_limit::rate_limit_middleware,
    ));

    rate_limited
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
