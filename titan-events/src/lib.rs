//! # titan-events
//!
//! The consistency pipeline between repositories and downstream state.
//!
//! Repositories publish an [`envelope::EventEnvelope`] after every
//! committed mutation. The [`bus::EventBus`] delivers events in per-entity
//! production order, at least once, without ever blocking the producer.
//! The [`writer::SingleWriter`] is the one legitimate source of cache
//! mutations: it consumes events, reconciles the cache tier and fans the
//! event out to isolated [`broadcast::EventBroadcaster`]s (WebSocket hub,
//! MQTT, plugin hooks).

pub mod broadcast;
pub mod bus;
pub mod envelope;
pub mod writer;

pub use broadcast::{BroadcastResult, EventBroadcaster, LogBroadcaster};
pub use bus::{EventBus, EventStream, MemoryEventBus};
pub use envelope::{EventEnvelope, EventType};
pub use writer::{SingleWriter, WriterHandle};
