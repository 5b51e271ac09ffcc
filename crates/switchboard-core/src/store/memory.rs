//! In-process store, for development and tests.
//!
//! Items live in an insertion-ordered map behind a mutex. The mutex guards a
//! single operation only; compound operations such as
//! [`Store::get_or_create`] are a read followed by a write, so two threads
//! racing on the same lookup can both insert. Callers sharing one instance
//! across threads must serialize such sequences themselves.

use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{SwitchboardError, SwitchboardResult};
use crate::store::Store;
use crate::types::{Fields, Item, ItemId, Lookup};

#[derive(Debug, Default)]
struct Items {
    entries: IndexMap<ItemId, Fields>,
    /// Next integer id to hand out; never reused after removals.
    next_id: i64,
}

impl Items {
    fn allocate(&mut self) -> ItemId {
        let id = self.next_id;
        self.next_id += 1;
        ItemId::Int(id)
    }

    fn reserve(&mut self, id: &ItemId) {
        if let ItemId::Int(n) = id {
            self.next_id = self.next_id.max(n.saturating_add(1));
        }
    }
}

/// In-memory store to be used for development.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: Mutex<Items>,
    shadow: OnceCell<Arc<InMemoryStore>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SwitchboardResult<MutexGuard<'_, Items>> {
        self.items
            .lock()
            .map_err(|_| SwitchboardError::poisoned("in-memory store"))
    }
}

impl Store for InMemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    fn save(&self, item: &mut Item) -> SwitchboardResult<ItemId> {
        let mut items = self.lock()?;
        let id = match item.take_id() {
            Some(id) => {
                items.reserve(&id);
                id
            }
            None => items.allocate(),
        };
        // Updating an existing id keeps its original position.
        items.entries.insert(id.clone(), item.fields.clone());
        item.id = Some(id.clone());
        tracing::trace!(id = %id, "saved in-memory item");
        Ok(id)
    }

    fn filter(&self, lookup: &Lookup) -> SwitchboardResult<Vec<Item>> {
        let items = self.lock()?;
        if let Some(id) = lookup.id() {
            return Ok(items
                .entries
                .get(id)
                .map(|fields| Item {
                    id: Some(id.clone()),
                    fields: fields.clone(),
                })
                .into_iter()
                .collect());
        }
        Ok(items
            .entries
            .iter()
            .filter(|(_, fields)| lookup.matches(fields))
            .map(|(id, fields)| Item {
                id: Some(id.clone()),
                fields: fields.clone(),
            })
            .collect())
    }

    fn remove(&self, lookup: &Lookup) -> SwitchboardResult<usize> {
        let mut items = self.lock()?;
        if let Some(id) = lookup.id() {
            return Ok(items.entries.shift_remove(id).map_or(0, |_| 1));
        }
        let before = items.entries.len();
        items.entries.retain(|_, fields| !lookup.matches(fields));
        Ok(before - items.entries.len())
    }

    fn count(&self) -> SwitchboardResult<usize> {
        Ok(self.lock()?.entries.len())
    }

    fn versioned(&self) -> SwitchboardResult<Arc<dyn Store>> {
        let shadow: Arc<dyn Store> = self
            .shadow
            .get_or_init(|| Arc::new(InMemoryStore::new()))
            .clone();
        Ok(shadow)
    }
}
