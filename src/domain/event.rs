//! Event envelope for streamfold projections
//!
//! This is the shape every event-store backend hands to the projection
//! engine. `no` is the per-stream monotonic event number; `metadata.stream`
//! names the stream the event was loaded from, which is how a merged
//! multi-stream load stays attributable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Event metadata carried alongside the payload.
///
/// `stream` is always present; everything else is backend- or user-defined
/// and only inspected by [`MetadataMatcher`](crate::domain::MetadataMatcher)
/// evaluation inside the event store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Stream this event belongs to.
    pub stream: String,

    /// Arbitrary additional metadata fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl EventMetadata {
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// Attach an extra metadata field.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Look up a metadata field by name. `"stream"` resolves to the stream.
    pub fn get(&self, key: &str) -> Option<Value> {
        if key == "stream" {
            return Some(Value::String(self.stream.clone()));
        }
        self.extra.get(key).cloned()
    }
}

/// A recorded event as loaded from (or appended to) a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Globally unique event identifier.
    pub id: Uuid,

    /// Per-stream monotonic event number, starting at 1.
    pub no: u64,

    /// Event name, used to route to named handlers.
    pub name: String,

    /// User payload.
    pub payload: Value,

    /// Metadata, including the owning stream.
    pub metadata: EventMetadata,

    /// Wall-clock timestamp at recording time. Metadata only; the engine
    /// never orders by it.
    pub created_at: DateTime<Utc>,
}

impl RecordedEvent {
    /// Create a new event destined for `stream`.
    pub fn new(
        stream: impl Into<String>,
        no: u64,
        name: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            no,
            name: name.into(),
            payload,
            metadata: EventMetadata::new(stream),
            created_at: Utc::now(),
        }
    }

    /// Replace the metadata wholesale.
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Stream this event belongs to.
    pub fn stream(&self) -> &str {
        &self.metadata.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_event_carries_stream_in_metadata() {
        let event = RecordedEvent::new("orders", 1, "order-placed", json!({"total": 12}));
        assert_eq!(event.stream(), "orders");
        assert_eq!(event.no, 1);
        assert_eq!(event.name, "order-placed");
    }

    #[test]
    fn metadata_get_resolves_stream_and_extra_fields() {
        let metadata = EventMetadata::new("orders").with("tenant", json!("acme"));
        assert_eq!(metadata.get("stream"), Some(json!("orders")));
        assert_eq!(metadata.get("tenant"), Some(json!("acme")));
        assert_eq!(metadata.get("missing"), None);
    }

    #[test]
    fn event_serde_roundtrip_flattens_extra_metadata() {
        let event = RecordedEvent::new("orders", 3, "order-shipped", json!({}))
            .with_metadata(EventMetadata::new("orders").with("carrier", json!("dhl")));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["metadata"]["stream"], "orders");
        assert_eq!(value["metadata"]["carrier"], "dhl");

        let back: RecordedEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back.metadata.get("carrier"), Some(json!("dhl")));
    }
}
