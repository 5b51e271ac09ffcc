//! Append-only delta log kept in a store's paired shadow store.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::{SwitchboardError, SwitchboardResult};
use crate::store::Store;
use crate::types::{Fields, ItemId, Lookup};
use crate::versioning::delta::{replay, Delta, VersionDelta, OWNER_FIELD, RESERVED_FIELDS};

/// History of item deltas, keyed by the owning item's id.
///
/// Entries are never rewritten or removed by normal operation, and they
/// outlive the deletion of the item they describe.
#[derive(Clone)]
pub struct VersionLog {
    store: Arc<dyn Store>,
}

impl VersionLog {
    /// Wrap a store used purely as a delta log.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The log paired with a primary store.
    pub fn for_store(primary: &dyn Store) -> SwitchboardResult<Self> {
        Ok(Self::new(primary.versioned()?))
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Total number of entries across all owners.
    pub fn count(&self) -> SwitchboardResult<usize> {
        self.store.count()
    }

    /// All entries for an item, oldest first.
    ///
    /// Ordered by timestamp, ties broken by sequence number.
    pub fn history_for(&self, id: &ItemId) -> SwitchboardResult<Vec<VersionDelta>> {
        let lookup = Lookup::all().eq(OWNER_FIELD, id.to_value());
        let mut entries = self
            .store
            .filter(&lookup)?
            .into_iter()
            .map(VersionDelta::from_item)
            .collect::<SwitchboardResult<Vec<_>>>()?;
        entries.sort_by_key(VersionDelta::order_key);
        Ok(entries)
    }

    /// Replay an item's full log. Empty when the item has no history.
    pub fn replay(&self, id: &ItemId) -> SwitchboardResult<Fields> {
        let entries = self.history_for(id)?;
        Ok(replay(entries.iter().map(|entry| &entry.delta)))
    }

    /// Replay the entries recorded at or before `at`.
    pub fn state_at(&self, id: &ItemId, at: DateTime<Utc>) -> SwitchboardResult<Option<Fields>> {
        let entries = self.history_for(id)?;
        let state = replay(
            entries
                .iter()
                .take_while(|entry| entry.timestamp <= at)
                .map(|entry| &entry.delta),
        );
        Ok((!state.is_empty()).then_some(state))
    }

    /// Append a delta for `id` unless it is empty.
    ///
    /// The timestamp never moves backwards within one item's log, and the
    /// sequence number strictly increases, so replay order is deterministic
    /// even when the clock does not advance between two saves.
    ///
    /// `extra` may not use any of [`RESERVED_FIELDS`]; such metadata is
    /// rejected before anything is written.
    pub fn append(
        &self,
        id: &ItemId,
        delta: Delta,
        extra: Fields,
    ) -> SwitchboardResult<Option<VersionDelta>> {
        if let Some(name) = RESERVED_FIELDS.iter().find(|name| extra.contains_key(**name)) {
            return Err(SwitchboardError::reserved_field(*name));
        }
        if delta.is_empty() {
            return Ok(None);
        }

        let last = self.history_for(id)?.pop();
        let now = Utc::now();
        let (timestamp, sequence) = match &last {
            Some(last) => (now.max(last.timestamp), last.sequence + 1),
            None => (now, 0),
        };

        let entry = VersionDelta {
            switch_id: id.clone(),
            timestamp,
            sequence,
            delta,
            extra,
        };
        let mut item = entry.to_item()?;
        self.store.save(&mut item)?;
        tracing::debug!(
            owner = %id,
            sequence,
            added = entry.delta.added.len(),
            changed = entry.delta.changed.len(),
            deleted = entry.delta.deleted.len(),
            "appended version delta"
        );
        Ok(Some(entry))
    }
}
