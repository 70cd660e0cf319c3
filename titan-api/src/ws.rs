//! WebSocket event hub.
//!
//! `WS /events?entity=aas|submodel&identifier=…` streams one JSON message
//! per committed event. The hub is a broadcaster fed by the Single
//! Writer; broadcasts iterate a snapshot of the subscriber set so a slow
//! client never blocks the writer, and a client whose queue is gone is
//! dropped on the next send.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use titan_events::{BroadcastResult, EventBroadcaster, EventEnvelope};

use crate::state::AppState;

/// Subscription filters supplied on the upgrade request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub entity: Option<String>,
    pub identifier: Option<String>,
}

struct Subscriber {
    id: u64,
    filter: EventFilter,
    sender: mpsc::UnboundedSender<String>,
}

/// Fan-out hub; registered with the Single Writer as a broadcaster.
pub struct WsHub {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl WsHub {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn register(&self, filter: EventFilter, sender: mpsc::UnboundedSender<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(Subscriber { id, filter, sender });
        }
        id
    }

    fn unregister(&self, id: u64) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|s| s.id != id);
        }
    }

    fn matches(filter: &EventFilter, event: &EventEnvelope) -> bool {
        if let Some(entity) = &filter.entity {
            if entity != event.entity.as_str() {
                return false;
            }
        }
        if let Some(identifier) = &filter.identifier {
            if identifier != &event.identifier {
                return false;
            }
        }
        true
    }

    /// Wire payload (§6.2): camelCase, no document bytes.
    fn payload(event: &EventEnvelope) -> String {
        let event_type = match event.event_type {
            titan_events::EventType::Created => "created",
            titan_events::EventType::Updated => "updated",
            titan_events::EventType::Deleted => "deleted",
        };
        json!({
            "eventId": event.event_id,
            "eventType": event_type,
            "entity": event.entity.as_str(),
            "identifier": event.identifier,
            "identifierB64": event.identifier_b64,
            "timestamp": event.timestamp.to_rfc3339(),
            "etag": event.etag,
        })
        .to_string()
    }
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBroadcaster for WsHub {
    fn name(&self) -> &str {
        "websocket"
    }

    async fn broadcast(&self, event: &EventEnvelope) -> BroadcastResult {
        // snapshot under the lock, send outside it
        let targets: Vec<(u64, mpsc::UnboundedSender<String>)> = {
            let Ok(subscribers) = self.subscribers.lock() else {
                return Ok(());
            };
            subscribers
                .iter()
                .filter(|s| Self::matches(&s.filter, event))
                .map(|s| (s.id, s.sender.clone()))
                .collect()
        };

        let payload = Self::payload(event);
        for (id, sender) in targets {
            if sender.send(payload.clone()).is_err() {
                self.unregister(id);
            }
        }
        Ok(())
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events", any(events_upgrade))
}

async fn events_upgrade(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(state, filter, socket))
}

async fn handle_socket(state: AppState, filter: EventFilter, mut socket: WebSocket) {
    let (sender, mut receiver) = mpsc::unbounded_channel::<String>();
    let id = state.ws_hub.register(filter, sender);
    debug!(subscriber = id, "websocket subscriber connected");

    loop {
        tokio::select! {
            outbound = receiver.recv() => {
                let Some(payload) = outbound else { break };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) if text.as_str() == "ping" => {
                        if socket.send(Message::Text("pong".into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.ws_hub.unregister(id);
    debug!(subscriber = id, "websocket subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use titan_core::EntityKind;
    use titan_events::EventType;

    fn sample_event() -> EventEnvelope {
        EventEnvelope::new(EntityKind::Aas, EventType::Created, "urn:example:aas:1")
            .with_doc(b"{}".to_vec(), "aa11")
    }

    #[test]
    fn filters_match_entity_and_identifier() {
        let event = sample_event();
        let open = EventFilter::default();
        assert!(WsHub::matches(&open, &event));

        let by_entity = EventFilter {
            entity: Some("aas".to_string()),
            identifier: None,
        };
        assert!(WsHub::matches(&by_entity, &event));

        let wrong_entity = EventFilter {
            entity: Some("submodel".to_string()),
            identifier: None,
        };
        assert!(!WsHub::matches(&wrong_entity, &event));

        let by_identifier = EventFilter {
            entity: None,
            identifier: Some("urn:example:aas:1".to_string()),
        };
        assert!(WsHub::matches(&by_identifier, &event));
    }

    #[test]
    fn payload_is_camel_case_without_doc_bytes() {
        let event = sample_event();
        let payload: serde_json::Value =
            serde_json::from_str(&WsHub::payload(&event)).unwrap();
        assert_eq!(payload["eventType"], "created");
        assert_eq!(payload["entity"], "aas");
        assert_eq!(payload["identifierB64"], "dXJuOmV4YW1wbGU6YWFzOjE");
        assert_eq!(payload["etag"], "aa11");
        assert!(payload.get("doc_bytes").is_none());
    }

    #[tokio::test]
    async fn broadcast_drops_closed_subscribers() {
        let hub = WsHub::new();
        let (sender, receiver) = mpsc::unbounded_channel();
        hub.register(EventFilter::default(), sender);
        assert_eq!(hub.subscriber_count(), 1);

        drop(receiver);
        hub.broadcast(&sample_event()).await.unwrap();
        assert_eq!(hub.subscriber_count(), 0);
    }
}
