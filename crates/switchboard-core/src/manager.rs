//! Switchboard facade wiring configuration, store and switch repository.

use std::sync::Arc;

use crate::config::{BackendKind, SwitchboardConfig};
use crate::entity::{Entity, Repository};
use crate::error::SwitchboardResult;
use crate::events::EventBus;
use crate::store::{InMemoryStore, SqliteStore, Store};
use crate::switch::Switch;
use crate::types::Lookup;

/// Entry point for applications: one store, one switch repository and one
/// event bus, built from a [`SwitchboardConfig`].
///
/// # Example
///
/// ```
/// use switchboard_core::{SwitchStatus, Switchboard, SwitchboardConfig};
///
/// let board = Switchboard::new(SwitchboardConfig::default())?;
/// let mut switch = board.switch("new_checkout")?;
/// switch.status = SwitchStatus::Global;
/// board.repository().save(&mut switch)?;
///
/// assert_eq!(board.switch("new_checkout")?.status, SwitchStatus::Global);
/// # Ok::<(), switchboard_core::SwitchboardError>(())
/// ```
pub struct Switchboard {
    config: SwitchboardConfig,
    repository: Repository<Switch>,
    event_bus: EventBus,
}

impl Switchboard {
    /// Open the configured backend.
    pub fn new(config: SwitchboardConfig) -> SwitchboardResult<Self> {
        config.validate()?;
        let store: Arc<dyn Store> = match config.backend {
            BackendKind::Memory => Arc::new(InMemoryStore::new()),
            BackendKind::Sqlite => Arc::new(SqliteStore::new(&config.db_path, &config.table)?),
        };
        Self::with_store(config, store)
    }

    /// Configuration from `SWITCHBOARD_*` environment variables.
    pub fn from_env() -> SwitchboardResult<Self> {
        Self::new(SwitchboardConfig::from_env()?)
    }

    /// Use an existing store; `config.backend` and `db_path` are ignored.
    pub fn with_store(config: SwitchboardConfig, store: Arc<dyn Store>) -> SwitchboardResult<Self> {
        let event_bus = EventBus::with_capacity(config.event_capacity);
        let repository: Repository<Switch> = if config.versioning {
            Repository::versioned(store)?
        } else {
            Repository::new(store)
        }
        .with_event_bus(event_bus.clone());

        tracing::info!(
            backend = repository.store().backend(),
            versioning = config.versioning,
            "switchboard ready"
        );
        Ok(Self {
            config,
            repository,
            event_bus,
        })
    }

    /// Fetch a switch by key, creating it on first use.
    ///
    /// New switches take the configured defaults for their key.
    pub fn switch(&self, key: &str) -> SwitchboardResult<Switch> {
        let seed = match self.config.switch_default(key) {
            Some(defaults) => Switch::from_defaults(key, defaults),
            None => Switch::new(key),
        };
        let (switch, created) = self
            .repository
            .get_or_create(seed.to_item()?.fields, &Lookup::all().eq("key", key))?;
        if created {
            tracing::info!(key, status = %switch.status, "created switch");
        }
        Ok(switch)
    }

    /// Fetch a switch by key without creating it.
    pub fn get(&self, key: &str) -> SwitchboardResult<Option<Switch>> {
        self.repository.get(&Lookup::all().eq("key", key))
    }

    pub fn all(&self) -> SwitchboardResult<Vec<Switch>> {
        self.repository.all()
    }

    /// Remove a switch by key. Its history stays in the version log.
    pub fn remove(&self, key: &str) -> SwitchboardResult<usize> {
        self.repository.remove(&Lookup::all().eq("key", key))
    }

    pub fn repository(&self) -> &Repository<Switch> {
        &self.repository
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &SwitchboardConfig {
        &self.config
    }
}
