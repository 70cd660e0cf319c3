//! Downstream broadcaster seam.
//!
//! WebSocket hubs, MQTT publishers, GraphQL subscription bridges and
//! plugin hooks all implement [`EventBroadcaster`]. The Single Writer
//! isolates them: one failing broadcaster never prevents the others.

use async_trait::async_trait;
use tracing::debug;

use crate::envelope::EventEnvelope;

/// Result of one broadcast attempt.
pub type BroadcastResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A downstream consumer of committed events.
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    /// Stable name for logs.
    fn name(&self) -> &str;

    async fn broadcast(&self, event: &EventEnvelope) -> BroadcastResult;
}

/// Trace-level broadcaster, useful in development deployments.
#[derive(Default)]
pub struct LogBroadcaster;

#[async_trait]
impl EventBroadcaster for LogBroadcaster {
    fn name(&self) -> &str {
        "log"
    }

    async fn broadcast(&self, event: &EventEnvelope) -> BroadcastResult {
        debug!(
            event_id = %event.event_id,
            entity = event.entity.as_str(),
            identifier = %event.identifier,
            "event"
        );
        Ok(())
    }
}
