//! Typed records on top of a [`Store`](crate::store::Store).
//!
//! An [`Entity`] converts to and from a store [`Item`]; a [`Repository`]
//! adds identity lifecycle, lifecycle signals and version history.

mod repository;
mod versioned;

pub use repository::Repository;

use crate::error::SwitchboardResult;
use crate::types::{Item, ItemId};

/// A record type persisted through a repository.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Kind name used in logs and events.
    const KIND: &'static str;

    fn id(&self) -> Option<&ItemId>;

    fn set_id(&mut self, id: Option<ItemId>);

    /// Serialize into a store item.
    fn to_item(&self) -> SwitchboardResult<Item>;

    /// Rebuild from a store item. Missing fields take their defaults.
    fn from_item(item: Item) -> SwitchboardResult<Self>;
}

/// A bare item is the schema-less entity: whatever fields it carries are
/// persisted as-is.
impl Entity for Item {
    const KIND: &'static str = "item";

    fn id(&self) -> Option<&ItemId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: Option<ItemId>) {
        self.id = id;
    }

    fn to_item(&self) -> SwitchboardResult<Item> {
        Ok(self.clone())
    }

    fn from_item(item: Item) -> SwitchboardResult<Self> {
        Ok(item)
    }
}
