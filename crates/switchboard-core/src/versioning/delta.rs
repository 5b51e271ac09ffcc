//! Field-level deltas between two states of an item.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SwitchboardResult;
use crate::types::{Fields, Item, ItemId, ID_FIELD};

/// Field names under which a [`VersionDelta`] is persisted.
pub(crate) const OWNER_FIELD: &str = "switch_id";

/// Entry fields that caller metadata may not shadow.
pub const RESERVED_FIELDS: [&str; 5] = [ID_FIELD, OWNER_FIELD, "timestamp", "sequence", "delta"];

/// Difference between a previous and a current field map.
///
/// `changed` maps a field to its `(old, new)` pair and is stored as a
/// two-element array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub added: Fields,
    #[serde(default)]
    pub deleted: Fields,
    #[serde(default)]
    pub changed: IndexMap<String, (Value, Value)>,
}

impl Delta {
    /// Compute the delta that turns `previous` into `current`.
    ///
    /// An absent side is treated as an empty map, so an absent previous
    /// state yields a full addition and an absent current state a full
    /// deletion.
    pub fn between(previous: Option<&Fields>, current: Option<&Fields>) -> Self {
        let empty = Fields::new();
        let previous = previous.unwrap_or(&empty);
        let current = current.unwrap_or(&empty);

        let mut delta = Delta::default();
        for (name, new) in current {
            match previous.get(name) {
                None => {
                    delta.added.insert(name.clone(), new.clone());
                }
                Some(old) if old != new => {
                    delta
                        .changed
                        .insert(name.clone(), (old.clone(), new.clone()));
                }
                Some(_) => {}
            }
        }
        for (name, old) in previous {
            if !current.contains_key(name) {
                delta.deleted.insert(name.clone(), old.clone());
            }
        }
        delta
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.changed.is_empty()
    }

    /// Fold this delta into `state`: upsert added and changed fields, drop
    /// deleted ones.
    pub fn apply(&self, state: &mut Fields) {
        for (name, value) in &self.added {
            state.insert(name.clone(), value.clone());
        }
        for (name, (_, new)) in &self.changed {
            state.insert(name.clone(), new.clone());
        }
        for name in self.deleted.keys() {
            state.shift_remove(name);
        }
    }
}

/// Fold deltas, in order, into an initially empty state.
pub fn replay<'a>(deltas: impl IntoIterator<Item = &'a Delta>) -> Fields {
    let mut state = Fields::new();
    for delta in deltas {
        delta.apply(&mut state);
    }
    state
}

/// One entry of the version log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDelta {
    /// Id of the item this delta belongs to.
    pub switch_id: ItemId,
    /// When the change was recorded.
    pub timestamp: DateTime<Utc>,
    /// Position within the owner's log; breaks timestamp ties.
    #[serde(default)]
    pub sequence: u64,
    pub delta: Delta,
    /// Caller-supplied metadata such as the acting user. Never uses a
    /// name from [`RESERVED_FIELDS`].
    #[serde(flatten)]
    pub extra: Fields,
}

impl VersionDelta {
    pub(crate) fn to_item(&self) -> SwitchboardResult<Item> {
        Item::from_json(serde_json::to_value(self)?)
    }

    pub(crate) fn from_item(item: Item) -> SwitchboardResult<Self> {
        Ok(serde_json::from_value(Value::Object(item.fields))?)
    }

    /// Ordering key used for replay.
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.timestamp, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn delta(value: Value) -> Delta {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_equal_states_give_empty_delta() {
        let state = fields(json!({"key": "foo", "status": 1, "value": {"ns": {}}}));
        let d = Delta::between(Some(&state), Some(&state));
        assert!(d.is_empty());
        assert_eq!(d, Delta::default());
        assert!(Delta::between(None, None).is_empty());
    }

    #[test]
    fn test_absent_sides() {
        let state = fields(json!({"a": 1, "b": 2}));
        let created = Delta::between(None, Some(&state));
        assert_eq!(created.added, state);
        assert!(created.deleted.is_empty() && created.changed.is_empty());

        let removed = Delta::between(Some(&state), None);
        assert_eq!(removed.deleted, state);
        assert!(removed.added.is_empty() && removed.changed.is_empty());
    }

    #[test]
    fn test_delta_reconstructs_both_states() {
        let previous = fields(json!({"a": 1, "b": 2, "c": 3}));
        let current = fields(json!({"b": 20, "c": 3, "d": 4}));
        let d = Delta::between(Some(&previous), Some(&current));

        assert_eq!(d.added, fields(json!({"d": 4})));
        assert_eq!(d.deleted, fields(json!({"a": 1})));
        assert_eq!(d.changed.get("b"), Some(&(json!(2), json!(20))));
        assert_eq!(d.changed.len(), 1);

        // previous + delta == current
        let mut forward = previous.clone();
        d.apply(&mut forward);
        assert_eq!(forward, current);

        // deleted + old sides of changed + untouched fields == previous
        let mut backward = current.clone();
        for name in d.added.keys() {
            backward.shift_remove(name);
        }
        for (name, (old, _)) in &d.changed {
            backward.insert(name.clone(), old.clone());
        }
        for (name, value) in &d.deleted {
            backward.insert(name.clone(), value.clone());
        }
        assert_eq!(backward, previous);
    }

    #[test]
    fn test_replay_empty_log() {
        assert!(replay(std::iter::empty()).is_empty());
    }

    #[test]
    fn test_replay_folds_in_order() {
        let log = [
            delta(json!({"added": {"a": 1, "b": 2}})),
            delta(json!({"changed": {"b": [2, 3]}})),
            delta(json!({"added": {"c": 4}})),
            delta(json!({"deleted": {"a": 1}})),
        ];
        assert_eq!(replay(&log[..1]), fields(json!({"a": 1, "b": 2})));
        assert_eq!(replay(&log), fields(json!({"b": 3, "c": 4})));
    }

    #[test]
    fn test_version_delta_item_layout() {
        let entry = VersionDelta {
            switch_id: ItemId::Int(3),
            timestamp: Utc::now(),
            sequence: 2,
            delta: delta(json!({"added": {"status": 1}})),
            extra: fields(json!({"user": "kadams"})),
        };
        let item = entry.to_item().unwrap();
        assert_eq!(item.get("switch_id"), Some(&json!(3)));
        assert_eq!(item.get("user"), Some(&json!("kadams")));
        assert!(item.get("delta").unwrap().get("changed").is_some());

        let back = VersionDelta::from_item(item).unwrap();
        assert_eq!(back, entry);
    }
}
