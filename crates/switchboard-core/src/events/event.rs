//! Lifecycle event published on the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::Signal;
use crate::types::{Item, ItemId};

/// A lifecycle notification for decoupled consumers.
///
/// Carries a serialized snapshot of the entity rather than the entity
/// itself, so subscribers do not need the entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEvent {
    /// Unique event ID
    pub event_id: String,
    pub signal: Signal,
    /// Entity kind, e.g. `switch`.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<ItemId>,
    /// Entity state as a JSON object, `id` included when assigned.
    pub snapshot: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl StoreEvent {
    pub fn new(signal: Signal, kind: impl Into<String>, item: &Item) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            signal,
            kind: kind.into(),
            entity_id: item.id.clone(),
            snapshot: item.to_json(),
            timestamp: Utc::now(),
        }
    }

    /// Event type as a string for filtering, e.g. `switch.post_save`.
    pub fn event_type(&self) -> String {
        format!("{}.{}", self.kind, self.signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_from_item() {
        let item = Item::new().with_id(4).with("key", "foo");
        let event = StoreEvent::new(Signal::PostSave, "switch", &item);
        assert_eq!(event.entity_id, Some(ItemId::Int(4)));
        assert_eq!(event.snapshot, json!({"key": "foo", "id": 4}));
        assert_eq!(event.event_type(), "switch.post_save");
        assert!(!event.event_id.is_empty());
    }
}
