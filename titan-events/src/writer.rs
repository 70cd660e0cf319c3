//! Single Writer.
//!
//! Subscribes to the bus and serializes reconciliation of downstream
//! state: cache pairs for identifiable entities, element `$value` keys for
//! submodel elements, then fan-out to broadcasters. Repositories may read
//! the cache but mutate it only through this path.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use titan_cache::TitanCache;
use titan_core::EntityKind;

use crate::broadcast::EventBroadcaster;
use crate::bus::EventBus;
use crate::envelope::{EventEnvelope, EventType};

/// How many processed event ids are remembered for duplicate suppression.
const DEDUP_WINDOW: usize = 4096;

/// Consumes events to keep cache and subscribers consistent with the DB.
pub struct SingleWriter {
    bus: Arc<dyn EventBus>,
    cache: Arc<dyn TitanCache>,
    broadcasters: Vec<Arc<dyn EventBroadcaster>>,
}

/// Handle for stopping a running writer.
pub struct WriterHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl WriterHandle {
    /// Stop the writer and wait for in-flight event handling to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.join_handle.await;
    }
}

impl SingleWriter {
    pub fn new(bus: Arc<dyn EventBus>, cache: Arc<dyn TitanCache>) -> Self {
        Self {
            bus,
            cache,
            broadcasters: Vec::new(),
        }
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn EventBroadcaster>) -> Self {
        self.broadcasters.push(broadcaster);
        self
    }

    /// Subscribe and start the processing loop.
    pub fn start(self) -> WriterHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let mut stream = self.bus.subscribe();

        let join_handle = tokio::spawn(async move {
            let mut seen: VecDeque<Uuid> = VecDeque::with_capacity(DEDUP_WINDOW);
            info!("single writer started");
            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                    event = stream.next() => {
                        let Some(event) = event else { break };
                        if seen.contains(&event.event_id) {
                            debug!(event_id = %event.event_id, "duplicate event skipped");
                            continue;
                        }
                        if seen.len() == DEDUP_WINDOW {
                            seen.pop_front();
                        }
                        seen.push_back(event.event_id);
                        self.handle_event(&event).await;
                    }
                }
            }
            info!("single writer stopped");
        });

        WriterHandle {
            shutdown_tx,
            join_handle,
        }
    }

    /// Reconcile the cache for one event, then fan out.
    ///
    /// Cache failures are logged and swallowed; the DB stays authoritative
    /// and readers fall through on a miss.
    async fn handle_event(&self, event: &EventEnvelope) {
        let outcome = match event.entity {
            EntityKind::SubmodelElement => self.reconcile_element(event).await,
            _ => self.reconcile_entity(event).await,
        };
        if let Err(reason) = outcome {
            warn!(
                event_id = %event.event_id,
                identifier = %event.identifier,
                %reason,
                "cache reconciliation degraded"
            );
        }

        for broadcaster in &self.broadcasters {
            if let Err(error) = broadcaster.broadcast(event).await {
                warn!(
                    broadcaster = broadcaster.name(),
                    event_id = %event.event_id,
                    %error,
                    "broadcaster failed; continuing with others"
                );
            }
        }
    }

    async fn reconcile_entity(&self, event: &EventEnvelope) -> Result<(), String> {
        let kind = event.entity;
        let id_b64 = &event.identifier_b64;

        match event.event_type {
            EventType::Created | EventType::Updated => {
                if let (Some(doc_bytes), Some(etag)) = (&event.doc_bytes, &event.etag) {
                    self.cache
                        .set_pair(kind, id_b64, doc_bytes, etag)
                        .await
                        .map_err(|e| e.to_string())?;
                }
                if kind == EntityKind::Submodel && event.event_type == EventType::Updated {
                    self.cache
                        .invalidate_submodel_elements(id_b64)
                        .await
                        .map_err(|e| e.to_string())?;
                }
            }
            EventType::Deleted => {
                self.cache
                    .delete_pair(kind, id_b64)
                    .await
                    .map_err(|e| e.to_string())?;
                if kind == EntityKind::Submodel {
                    self.cache
                        .invalidate_submodel_elements(id_b64)
                        .await
                        .map_err(|e| e.to_string())?;
                }
            }
        }
        Ok(())
    }

    async fn reconcile_element(&self, event: &EventEnvelope) -> Result<(), String> {
        let Some(path) = &event.id_short_path else {
            return Err("element event without id_short_path".to_string());
        };
        let submodel_b64 = &event.identifier_b64;

        match event.event_type {
            EventType::Created | EventType::Updated => {
                if let Some(value_bytes) = &event.value_bytes {
                    self.cache
                        .set_element_value(submodel_b64, path, value_bytes)
                        .await
                        .map_err(|e| e.to_string())?;
                }
            }
            EventType::Deleted => {
                self.cache
                    .delete_element_value(submodel_b64, path)
                    .await
                    .map_err(|e| e.to_string())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryEventBus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use titan_cache::MemoryCache;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn created_event_primes_the_cache() {
        let bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::new(16));
        let cache = Arc::new(MemoryCache::default());
        let handle = SingleWriter::new(bus.clone(), cache.clone()).start();

        let event = EventEnvelope::new(EntityKind::Aas, EventType::Created, "urn:example:aas:1")
            .with_doc(b"{\"id\":\"urn:example:aas:1\"}".to_vec(), "aa11");
        let id_b64 = event.identifier_b64.clone();
        bus.publish(event).await.unwrap();
        settle().await;

        let (bytes, etag) = cache
            .get_pair(EntityKind::Aas, &id_b64)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(etag, "aa11");
        assert!(!bytes.is_empty());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn submodel_update_invalidates_element_values() {
        let bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::new(16));
        let cache = Arc::new(MemoryCache::default());
        let handle = SingleWriter::new(bus.clone(), cache.clone()).start();

        let event =
            EventEnvelope::new(EntityKind::Submodel, EventType::Updated, "urn:example:sm:1")
                .with_doc(b"{}".to_vec(), "bb22");
        let id_b64 = event.identifier_b64.clone();
        cache
            .set_element_value(&id_b64, "a.b", b"\"stale\"")
            .await
            .unwrap();

        bus.publish(event).await.unwrap();
        settle().await;

        assert!(cache.get_element_value(&id_b64, "a.b").await.unwrap().is_none());
        assert!(cache.get_pair(EntityKind::Submodel, &id_b64).await.unwrap().is_some());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn delete_event_clears_the_pair() {
        let bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::new(16));
        let cache = Arc::new(MemoryCache::default());
        let handle = SingleWriter::new(bus.clone(), cache.clone()).start();

        let created = EventEnvelope::new(EntityKind::Aas, EventType::Created, "urn:x")
            .with_doc(b"{}".to_vec(), "cc33");
        let id_b64 = created.identifier_b64.clone();
        bus.publish(created).await.unwrap();
        bus.publish(EventEnvelope::new(EntityKind::Aas, EventType::Deleted, "urn:x"))
            .await
            .unwrap();
        settle().await;

        assert!(cache.get_pair(EntityKind::Aas, &id_b64).await.unwrap().is_none());
        handle.shutdown().await;
    }

    struct FailingBroadcaster;
    struct CountingBroadcaster(AtomicUsize);

    #[async_trait]
    impl EventBroadcaster for FailingBroadcaster {
        fn name(&self) -> &str {
            "failing"
        }
        async fn broadcast(&self, _event: &EventEnvelope) -> crate::broadcast::BroadcastResult {
            Err("downstream offline".into())
        }
    }

    #[async_trait]
    impl EventBroadcaster for CountingBroadcaster {
        fn name(&self) -> &str {
            "counting"
        }
        async fn broadcast(&self, _event: &EventEnvelope) -> crate::broadcast::BroadcastResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn broadcaster_failure_is_isolated() {
        let bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::new(16));
        let cache = Arc::new(MemoryCache::default());
        let counter = Arc::new(CountingBroadcaster(AtomicUsize::new(0)));
        let handle = SingleWriter::new(bus.clone(), cache)
            .with_broadcaster(Arc::new(FailingBroadcaster))
            .with_broadcaster(counter.clone())
            .start();

        bus.publish(
            EventEnvelope::new(EntityKind::Aas, EventType::Created, "urn:x")
                .with_doc(b"{}".to_vec(), "dd44"),
        )
        .await
        .unwrap();
        settle().await;

        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        handle.shutdown().await;
    }
}
