//! Storage backends for switchboard items.
//!
//! A store holds schema-less [`Item`]s keyed by a store-assigned [`ItemId`].
//! Every backend honors the same contract:
//!
//! - `save` inserts items without an id and updates items with one in place.
//! - `get`/`filter` use exact equality on every filter; an id filter
//!   short-circuits all other filters.
//! - A lookup matching nothing is `None` / an empty vector, never an error.
//! - Operations a backend does not provide fail with
//!   [`SwitchboardError::NotImplemented`].

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::{is_valid_table_name, SqliteStore};

use std::sync::Arc;

use crate::error::{SwitchboardError, SwitchboardResult};
use crate::types::{Fields, Item, ItemId, Lookup};

/// Common interface for switchboard store backends.
pub trait Store: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend(&self) -> &str;

    /// Add or update the given item, returning its id.
    ///
    /// The id is stripped from the item before its fields are persisted and
    /// assigned back to `item.id` once the write succeeded.
    fn save(&self, item: &mut Item) -> SwitchboardResult<ItemId> {
        let _ = item;
        Err(SwitchboardError::not_implemented("save", self.backend()))
    }

    /// Retrieve all items matching the lookup, or every item for an empty one.
    fn filter(&self, lookup: &Lookup) -> SwitchboardResult<Vec<Item>> {
        let _ = lookup;
        Err(SwitchboardError::not_implemented("filter", self.backend()))
    }

    /// Remove all items matching the lookup; an empty lookup empties the store.
    ///
    /// Returns the number of removed items.
    fn remove(&self, lookup: &Lookup) -> SwitchboardResult<usize> {
        let _ = lookup;
        Err(SwitchboardError::not_implemented("remove", self.backend()))
    }

    /// Number of items in the store.
    fn count(&self) -> SwitchboardResult<usize> {
        Err(SwitchboardError::not_implemented("count", self.backend()))
    }

    /// The paired store holding version deltas, created on first use.
    ///
    /// Repeated calls return the same instance for the lifetime of `self`.
    fn versioned(&self) -> SwitchboardResult<Arc<dyn Store>> {
        Err(SwitchboardError::not_implemented("versioned", self.backend()))
    }

    /// Retrieve the first item matching the lookup.
    fn get(&self, lookup: &Lookup) -> SwitchboardResult<Option<Item>> {
        Ok(self.filter(lookup)?.into_iter().next())
    }

    /// Retrieve an item if it already exists, create it otherwise.
    ///
    /// The lookup doubles as the seed of the created item; `defaults` are
    /// merged over it and win on collisions. This default implementation is a
    /// plain read followed by a write: two callers racing on the same lookup
    /// may both create an item. Backends with transactions override it.
    fn get_or_create(&self, defaults: Fields, lookup: &Lookup) -> SwitchboardResult<(Item, bool)> {
        if let Some(found) = self.get(lookup)? {
            return Ok((found, false));
        }
        let mut item = seed_item(defaults, lookup)?;
        self.save(&mut item)?;
        Ok((item, true))
    }
}

/// Build the item `get_or_create` inserts: lookup fields overlaid with defaults.
///
/// A lookup carrying an unusable id cannot seed an item.
pub(crate) fn seed_item(defaults: Fields, lookup: &Lookup) -> SwitchboardResult<Item> {
    if let Some(value) = lookup.unmatched_id() {
        return Err(SwitchboardError::validation(format!(
            "{} cannot be used as an item id",
            value
        )));
    }
    let mut fields = lookup.to_fields();
    for (name, value) in defaults {
        fields.insert(name, value);
    }
    Ok(Item::from_fields(fields))
}
