//! Event envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use titan_core::{encode_id, EntityKind};

/// Mutation kind carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

/// One mutation observed by the pipeline.
///
/// `event_id` is unique; `timestamp` is monotonic per entity because the
/// producing repository serializes writes per identifier. `doc_bytes` and
/// `value_bytes` ride along in-process only and never serialize onto the
/// wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub entity: EntityKind,
    pub identifier: String,
    pub identifier_b64: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip)]
    pub doc_bytes: Option<Vec<u8>>,
    #[serde(skip)]
    pub value_bytes: Option<Vec<u8>>,
    /// Set for submodel-element events; `identifier` is then the hosting
    /// submodel id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_short_path: Option<String>,
}

impl EventEnvelope {
    pub fn new(entity: EntityKind, event_type: EventType, identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let identifier_b64 = encode_id(&identifier);
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            entity,
            identifier,
            identifier_b64,
            timestamp: Utc::now(),
            etag: None,
            doc_bytes: None,
            value_bytes: None,
            id_short_path: None,
        }
    }

    /// Attach the committed canonical bytes and ETag.
    pub fn with_doc(mut self, doc_bytes: Vec<u8>, etag: impl Into<String>) -> Self {
        self.doc_bytes = Some(doc_bytes);
        self.etag = Some(etag.into());
        self
    }

    /// Mark this as a submodel-element event for `id_short_path`.
    pub fn with_element(mut self, id_short_path: impl Into<String>, value_bytes: Option<Vec<u8>>) -> Self {
        self.id_short_path = Some(id_short_path.into());
        self.value_bytes = value_bytes;
        self
    }
}
