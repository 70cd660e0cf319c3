//! Multi-tenant context.
//!
//! An entity belongs to exactly one tenant for its entire lifetime; every
//! repository, cache and queue operation carries a [`TenantContext`] so the
//! partition is explicit in the API contract rather than a key prefix
//! convention.

use serde::{Deserialize, Serialize};

/// Tenant used when no tenant header or token claim is present.
pub const DEFAULT_TENANT: &str = "default";

/// Opaque tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context carried with every Titan operation.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    /// Authenticated subject, when an auth layer is configured.
    pub subject: Option<String>,
}

impl TenantContext {
    pub fn new<S: Into<String>>(tenant: S) -> Self {
        Self {
            tenant_id: TenantId(tenant.into()),
            subject: None,
        }
    }

    pub fn with_subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

impl Default for TenantContext {
    fn default() -> Self {
        Self::new(DEFAULT_TENANT)
    }
}
