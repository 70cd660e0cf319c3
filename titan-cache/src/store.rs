use std::time::Duration;

use async_trait::async_trait;

use titan_core::EntityKind;

use crate::CacheResult;

/// TTL policy for cached values.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtl {
    /// Whole-entity pairs (bytes + etag).
    pub entity: Duration,
    /// Element `$value` entries change more often and expire sooner.
    pub element_value: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            entity: Duration::from_secs(3600),
            element_value: Duration::from_secs(300),
        }
    }
}

/// Cache operations for AAS entities.
///
/// Repositories read through this trait; writes happen only from the
/// Single Writer after the repository commit (publishing an event is the
/// only way a repository reaches the cache mutably).
#[async_trait]
pub trait TitanCache: Send + Sync {
    /// Get cached bytes and ETag as one atomic read.
    async fn get_pair(
        &self,
        kind: EntityKind,
        id_b64: &str,
    ) -> CacheResult<Option<(Vec<u8>, String)>>;

    /// Cache bytes and ETag as one atomic write.
    async fn set_pair(
        &self,
        kind: EntityKind,
        id_b64: &str,
        doc_bytes: &[u8],
        etag: &str,
    ) -> CacheResult<()>;

    /// Drop the cached pair.
    async fn delete_pair(&self, kind: EntityKind, id_b64: &str) -> CacheResult<()>;

    /// Get a cached element `$value`.
    async fn get_element_value(
        &self,
        submodel_b64: &str,
        id_short_path: &str,
    ) -> CacheResult<Option<Vec<u8>>>;

    /// Cache an element `$value`.
    async fn set_element_value(
        &self,
        submodel_b64: &str,
        id_short_path: &str,
        value_bytes: &[u8],
    ) -> CacheResult<()>;

    /// Drop one cached element `$value`.
    async fn delete_element_value(
        &self,
        submodel_b64: &str,
        id_short_path: &str,
    ) -> CacheResult<()>;

    /// Scan-delete every element value cached for a submodel.
    /// Returns the number of entries removed.
    async fn invalidate_submodel_elements(&self, submodel_b64: &str) -> CacheResult<usize>;

    /// Generic counter with TTL, used by the rate limiter. Returns the
    /// value after increment.
    async fn increment(&self, key: &str, ttl: Duration) -> CacheResult<u64>;

    /// Backend connectivity probe.
    async fn health_check(&self) -> bool;
}
