//! Identity lifecycle and signals for one entity kind.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::entity::Entity;
use crate::error::{SwitchboardError, SwitchboardResult};
use crate::events::{EventBus, Signal, Signals, StoreEvent};
use crate::store::Store;
use crate::types::{Fields, ItemId, Lookup};

/// Entry point for creating, finding and removing entities of one kind.
///
/// The store is injected at construction; several repositories may share
/// one store. No locking happens at this level: conflicting saves of the
/// same entity resolve as last write wins.
pub struct Repository<E: Entity> {
    pub(super) store: Arc<dyn Store>,
    pub(super) versioning: bool,
    signals: Signals<E>,
    event_bus: Option<EventBus>,
    _kind: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    /// A repository without change tracking.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            versioning: false,
            signals: Signals::new(),
            event_bus: None,
            _kind: PhantomData,
        }
    }

    /// A repository recording a delta on every save and removal.
    ///
    /// Fails when the backend has no paired version store.
    pub fn versioned(store: Arc<dyn Store>) -> SwitchboardResult<Self> {
        store.versioned()?;
        let mut repository = Self::new(store);
        repository.versioning = true;
        Ok(repository)
    }

    /// Also publish lifecycle events on an event bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn is_versioned(&self) -> bool {
        self.versioning
    }

    /// Register a lifecycle observer.
    pub fn connect<F>(&self, signal: Signal, observer: F) -> SwitchboardResult<()>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.signals.connect(signal, observer)
    }

    pub fn signals(&self) -> &Signals<E> {
        &self.signals
    }

    fn notify(&self, signal: Signal, entity: &E) -> SwitchboardResult<()> {
        self.signals.send(signal, entity)?;
        if let Some(bus) = &self.event_bus {
            bus.emit(StoreEvent::new(signal, E::KIND, &entity.to_item()?));
        }
        Ok(())
    }

    /// Persist the entity, assigning an id on first save.
    ///
    /// Order: `pre_save`, primary write, version delta, `post_save`. The
    /// delta is taken between the replayed log and the freshly written
    /// state, so a failed append is recovered by the next save.
    pub fn save(&self, entity: &mut E) -> SwitchboardResult<ItemId> {
        let previous = match entity.id() {
            Some(id) => self.get(&Lookup::by_id(id.clone()))?,
            None => None,
        };
        self.notify(Signal::PreSave, previous.as_ref().unwrap_or(&*entity))?;

        let mut item = entity.to_item()?;
        let id = self.store.save(&mut item)?;
        entity.set_id(Some(id.clone()));
        tracing::debug!(kind = E::KIND, id = %id, created = previous.is_none(), "saved entity");

        if self.versioning {
            self.save_version(entity, Fields::new())?;
        }
        self.notify(Signal::PostSave, entity)?;
        Ok(id)
    }

    /// Build and save an entity in one step.
    pub fn create(&self, mut entity: E) -> SwitchboardResult<E> {
        self.save(&mut entity)?;
        Ok(entity)
    }

    /// Remove one persisted entity.
    pub fn delete(&self, entity: &E) -> SwitchboardResult<usize> {
        let id = entity.id().cloned().ok_or_else(|| {
            SwitchboardError::validation(format!("cannot delete an unsaved {}", E::KIND))
        })?;
        self.remove(&Lookup::by_id(id))
    }

    /// First entity matching the lookup.
    pub fn get(&self, lookup: &Lookup) -> SwitchboardResult<Option<E>> {
        self.store.get(lookup)?.map(E::from_item).transpose()
    }

    /// Fetch an entity, creating it from `lookup` and `defaults` if missing.
    ///
    /// Observers see `post_save` only when the entity was created.
    pub fn get_or_create(&self, defaults: Fields, lookup: &Lookup) -> SwitchboardResult<(E, bool)> {
        let (item, created) = self.store.get_or_create(defaults, lookup)?;
        let entity = E::from_item(item)?;
        if created {
            if self.versioning {
                self.save_version(&entity, Fields::new())?;
            }
            self.notify(Signal::PostSave, &entity)?;
        }
        Ok((entity, created))
    }

    /// All entities matching the lookup.
    pub fn find(&self, lookup: &Lookup) -> SwitchboardResult<Vec<E>> {
        self.store
            .filter(lookup)?
            .into_iter()
            .map(E::from_item)
            .collect()
    }

    pub fn all(&self) -> SwitchboardResult<Vec<E>> {
        self.find(&Lookup::all())
    }

    /// Remove every entity matching the lookup; an empty lookup removes all.
    ///
    /// Each removed entity gets a full-deletion delta in its version log;
    /// the log itself is kept.
    pub fn remove(&self, lookup: &Lookup) -> SwitchboardResult<usize> {
        let doomed = self.find(lookup)?;
        for entity in &doomed {
            self.notify(Signal::PreDelete, entity)?;
        }

        let removed = self.store.remove(lookup)?;
        tracing::debug!(kind = E::KIND, removed, "removed entities");

        for entity in &doomed {
            if self.versioning {
                self.save_version(entity, Fields::new())?;
            }
            self.notify(Signal::PostDelete, entity)?;
        }
        Ok(removed)
    }

    pub fn count(&self) -> SwitchboardResult<usize> {
        self.store.count()
    }
}
