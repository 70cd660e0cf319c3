//! Event bus.
//!
//! Logical ordered, at-least-once channel from repositories to the Single
//! Writer and other subscribers. The in-memory implementation rides on a
//! bounded `tokio::sync::broadcast` ring: one channel keeps per-entity
//! FIFO order, and a slow subscriber sheds its oldest events (logged)
//! instead of ever blocking or crashing the producer. Durable stream
//! backends plug in behind the same trait.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use titan_core::TitanResult;

use crate::envelope::EventEnvelope;

/// Boxed subscriber stream.
pub type EventStream = Pin<Box<dyn Stream<Item = EventEnvelope> + Send + 'static>>;

/// Producer/subscriber seam of the pipeline.
///
/// Contract: `publish` is called after the repository's atomic write
/// commits; a publish failure is logged and retried by the caller, never
/// surfaced to the inbound request.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: EventEnvelope) -> TitanResult<()>;

    fn subscribe(&self) -> EventStream;

    /// Connectivity probe for health reporting.
    async fn health_check(&self) -> bool;
}

/// Bounded in-memory bus for single-node deployments.
pub struct MemoryEventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl MemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> TitanResult<()> {
        // send only fails when no subscriber exists; the DB stays
        // authoritative either way
        if self.sender.send(event).is_err() {
            debug!("event published with no active subscribers");
        }
        Ok(())
    }

    fn subscribe(&self) -> EventStream {
        let stream = BroadcastStream::new(self.sender.subscribe()).filter_map(|item| async {
            match item {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(missed)) => {
                    warn!(missed, "slow event subscriber shed events");
                    None
                }
            }
        });
        Box::pin(stream)
    }

    async fn health_check(&self) -> bool {
        // in-process ring; nothing external to probe
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::EventType;
    use titan_core::EntityKind;

    #[tokio::test]
    async fn per_entity_order_is_preserved() {
        let bus = MemoryEventBus::new(64);
        let mut stream = bus.subscribe();

        for event_type in [EventType::Created, EventType::Updated, EventType::Deleted] {
            bus.publish(EventEnvelope::new(EntityKind::Aas, event_type, "urn:x"))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(stream.next().await.unwrap().event_type);
        }
        assert_eq!(
            seen,
            vec![EventType::Created, EventType::Updated, EventType::Deleted]
        );
    }

    #[tokio::test]
    async fn publish_without_subscribers_never_fails() {
        let bus = MemoryEventBus::new(4);
        bus.publish(EventEnvelope::new(
            EntityKind::Submodel,
            EventType::Created,
            "urn:x",
        ))
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let bus = MemoryEventBus::new(16);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(EventEnvelope::new(EntityKind::Aas, EventType::Created, "urn:x"))
            .await
            .unwrap();

        assert_eq!(first.next().await.unwrap().identifier, "urn:x");
        assert_eq!(second.next().await.unwrap().identifier, "urn:x");
    }
}
