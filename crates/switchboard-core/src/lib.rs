//! switchboard-core - Core library for switchboard.
//!
//! This crate provides the storage contract, the in-memory and SQLite
//! backends, the feature switch entity and the versioning model that keeps
//! an auditable history of every change.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use switchboard_core::{InMemoryStore, Lookup, Repository, Switch, SwitchStatus};
//!
//! let repo: Repository<Switch> = Repository::versioned(Arc::new(InMemoryStore::new()))?;
//!
//! let mut switch = repo.create(Switch::new("new_checkout"))?;
//! switch.status = SwitchStatus::Global;
//! repo.save(&mut switch)?;
//!
//! let found = repo.get(&Lookup::all().eq("key", "new_checkout"))?;
//! assert_eq!(found.map(|s| s.status), Some(SwitchStatus::Global));
//! assert_eq!(repo.list_versions(&switch)?.len(), 2);
//! # Ok::<(), switchboard_core::SwitchboardError>(())
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod manager;
pub mod store;
pub mod switch;
pub mod types;
pub mod versioning;

// Re-export commonly used types
pub use config::{BackendKind, SwitchDefault, SwitchboardConfig};
pub use entity::{Entity, Repository};
pub use error::{ErrorCode, SwitchboardError, SwitchboardResult};
pub use events::{EventBus, EventSubscriber, Signal, StoreEvent};
pub use manager::Switchboard;
pub use store::{InMemoryStore, SqliteStore, Store};
pub use switch::{
    ActiveCondition, Condition, ConditionField, ConditionFlag, ConditionProvider, ConditionSet,
    Switch, SwitchStatus, SwitchSummary,
};
pub use types::{Fields, Item, ItemId, Lookup};
pub use versioning::{Delta, VersionDelta, VersionLog};
