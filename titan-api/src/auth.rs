//! Authentication seam.
//!
//! Token validation itself (OIDC discovery, JWKS fetch, signature checks)
//! is an external collaborator; this module only carries its contract.
//! Without an issuer configured the service runs with anonymous full
//! access.

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

use titan_core::{TitanError, TitanResult};

use crate::error::ApiError;
use crate::state::AppState;

/// Verifies a bearer token and yields the authenticated subject.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, bearer: Option<&str>) -> TitanResult<Option<String>>;
}

/// No auth configured: every request passes without a subject.
pub struct AnonymousAccess;

#[async_trait]
impl TokenVerifier for AnonymousAccess {
    async fn verify(&self, _bearer: Option<&str>) -> TitanResult<Option<String>> {
        Ok(None)
    }
}

/// Issuer configured: a bearer token is mandatory. The subject recorded
/// here is a token digest; the external OIDC validator that replaces this
/// type resolves real claims.
pub struct RequireBearer;

#[async_trait]
impl TokenVerifier for RequireBearer {
    async fn verify(&self, bearer: Option<&str>) -> TitanResult<Option<String>> {
        let Some(token) = bearer else {
            return Err(TitanError::unauthorized("missing bearer token"));
        };
        let digest = Sha256::digest(token.as_bytes());
        let mut subject = String::with_capacity(16);
        for byte in &digest[..8] {
            subject.push_str(&format!("{byte:02x}"));
        }
        Ok(Some(format!("token:{subject}")))
    }
}

fn bearer_from_request(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Short-circuits unauthenticated requests before any state touches.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer = bearer_from_request(&request).map(str::to_string);
    let subject = state.verifier.verify(bearer.as_deref()).await?;

    // the subject header is derived here, never client-supplied
    request.headers_mut().remove("x-auth-subject");
    if let Some(subject) = subject {
        if let Ok(value) = HeaderValue::from_str(&subject) {
            request.headers_mut().insert("x-auth-subject", value);
        }
    }
    Ok(next.run(request).await)
}
