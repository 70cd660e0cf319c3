//! In-memory cache backend.
//!
//! Single-node reference backend with per-entry expiry. Expired entries
//! are dropped lazily on read and swept opportunistically on writes; the
//! pair operations take one lock so bytes and etag stay consistent.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use titan_core::EntityKind;

use crate::keys::CacheKeys;
use crate::store::{CacheTtl, TitanCache};
use crate::CacheResult;

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// HashMap-backed cache with TTL semantics.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: CacheTtl,
}

impl MemoryCache {
    pub fn new(ttl: CacheTtl) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn get_live(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.live(now))
            .map(|entry| entry.value.clone())
    }

    fn insert(&self, key: String, value: Vec<u8>, ttl: Duration) {
        let mut entries = self.entries.write();
        sweep_expired(&mut entries);
        entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Number of live entries (test and introspection helper).
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().values().filter(|e| e.live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(CacheTtl::default())
    }
}

fn sweep_expired(entries: &mut HashMap<String, Entry>) {
    let now = Instant::now();
    entries.retain(|_, entry| entry.live(now));
}

#[async_trait]
impl TitanCache for MemoryCache {
    async fn get_pair(
        &self,
        kind: EntityKind,
        id_b64: &str,
    ) -> CacheResult<Option<(Vec<u8>, String)>> {
        let now = Instant::now();
        let entries = self.entries.read();
        let bytes = entries
            .get(&CacheKeys::entity_bytes(kind, id_b64))
            .filter(|e| e.live(now));
        let etag = entries
            .get(&CacheKeys::entity_etag(kind, id_b64))
            .filter(|e| e.live(now));
        match (bytes, etag) {
            (Some(bytes), Some(etag)) => Ok(Some((
                bytes.value.clone(),
                String::from_utf8_lossy(&etag.value).into_owned(),
            ))),
            _ => Ok(None),
        }
    }

    async fn set_pair(
        &self,
        kind: EntityKind,
        id_b64: &str,
        doc_bytes: &[u8],
        etag: &str,
    ) -> CacheResult<()> {
        let expires_at = Instant::now() + self.ttl.entity;
        let mut entries = self.entries.write();
        sweep_expired(&mut entries);
        entries.insert(
            CacheKeys::entity_bytes(kind, id_b64),
            Entry {
                value: doc_bytes.to_vec(),
                expires_at,
            },
        );
        entries.insert(
            CacheKeys::entity_etag(kind, id_b64),
            Entry {
                value: etag.as_bytes().to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete_pair(&self, kind: EntityKind, id_b64: &str) -> CacheResult<()> {
        let mut entries = self.entries.write();
        entries.remove(&CacheKeys::entity_bytes(kind, id_b64));
        entries.remove(&CacheKeys::entity_etag(kind, id_b64));
        Ok(())
    }

    async fn get_element_value(
        &self,
        submodel_b64: &str,
        id_short_path: &str,
    ) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.get_live(&CacheKeys::element_value(submodel_b64, id_short_path)))
    }

    async fn set_element_value(
        &self,
        submodel_b64: &str,
        id_short_path: &str,
        value_bytes: &[u8],
    ) -> CacheResult<()> {
        self.insert(
            CacheKeys::element_value(submodel_b64, id_short_path),
            value_bytes.to_vec(),
            self.ttl.element_value,
        );
        Ok(())
    }

    async fn delete_element_value(
        &self,
        submodel_b64: &str,
        id_short_path: &str,
    ) -> CacheResult<()> {
        self.entries
            .write()
            .remove(&CacheKeys::element_value(submodel_b64, id_short_path));
        Ok(())
    }

    async fn invalidate_submodel_elements(&self, submodel_b64: &str) -> CacheResult<usize> {
        let pattern = CacheKeys::element_pattern(submodel_b64);
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&pattern));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(submodel = submodel_b64, removed, "invalidated element values");
        }
        Ok(removed)
    }

    async fn increment(&self, key: &str, ttl: Duration) -> CacheResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let counter = match entries.get(key).filter(|e| e.live(now)) {
            Some(entry) => {
                let current = String::from_utf8_lossy(&entry.value)
                    .parse::<u64>()
                    .unwrap_or(0);
                // keep the original window expiry
                let expires_at = entry.expires_at;
                let next = current + 1;
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: next.to_string().into_bytes(),
                        expires_at,
                    },
                );
                next
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: b"1".to_vec(),
                        expires_at: now + ttl,
                    },
                );
                1
            }
        };
        Ok(counter)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_ttl() -> CacheTtl {
        CacheTtl {
            entity: Duration::from_millis(40),
            element_value: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn pair_roundtrip_and_delete() {
        let cache = MemoryCache::default();
        cache
            .set_pair(EntityKind::Aas, "aWQ", b"{}", "abcd")
            .await
            .unwrap();
        let (bytes, etag) = cache.get_pair(EntityKind::Aas, "aWQ").await.unwrap().unwrap();
        assert_eq!(bytes, b"{}");
        assert_eq!(etag, "abcd");

        cache.delete_pair(EntityKind::Aas, "aWQ").await.unwrap();
        assert!(cache.get_pair(EntityKind::Aas, "aWQ").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = MemoryCache::new(short_ttl());
        cache
            .set_element_value("c20", "a.b", b"\"x\"")
            .await
            .unwrap();
        assert!(cache.get_element_value("c20", "a.b").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get_element_value("c20", "a.b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pattern_invalidation_targets_one_submodel() {
        let cache = MemoryCache::default();
        cache.set_element_value("c20x", "a", b"1").await.unwrap();
        cache.set_element_value("c20x", "b", b"2").await.unwrap();
        cache.set_element_value("other", "a", b"3").await.unwrap();

        let removed = cache.invalidate_submodel_elements("c20x").await.unwrap();
        assert_eq!(removed, 2);
        assert!(cache.get_element_value("c20x", "a").await.unwrap().is_none());
        assert!(cache.get_element_value("other", "a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn increment_counts_within_window() {
        let cache = MemoryCache::default();
        let ttl = Duration::from_secs(60);
        assert_eq!(cache.increment("rl:1.2.3.4", ttl).await.unwrap(), 1);
        assert_eq!(cache.increment("rl:1.2.3.4", ttl).await.unwrap(), 2);
        assert_eq!(cache.increment("rl:other", ttl).await.unwrap(), 1);
    }
}
