//! Change tracking for repositories built with [`Repository::versioned`].

use chrono::{DateTime, Utc};

use crate::entity::{Entity, Repository};
use crate::error::SwitchboardResult;
use crate::types::{Fields, Item, ItemId, Lookup};
use crate::versioning::{Delta, VersionDelta, VersionLog};

impl<E: Entity> Repository<E> {
    /// The delta log paired with this repository's store.
    pub fn version_log(&self) -> SwitchboardResult<VersionLog> {
        VersionLog::for_store(self.store.as_ref())
    }

    fn persisted_fields(&self, id: &ItemId) -> SwitchboardResult<Option<Fields>> {
        Ok(self
            .store
            .get(&Lookup::by_id(id.clone()))?
            .map(|item| item.fields))
    }

    /// Difference between the replayed history and the persisted state.
    ///
    /// The persisted side is fetched fresh by id; it is absent when the
    /// entity has no id or was removed. An empty replay counts as absent.
    pub fn diff(&self, entity: &E) -> SwitchboardResult<Delta> {
        let Some(id) = entity.id() else {
            return Ok(Delta::default());
        };
        let current = self.persisted_fields(id)?;
        let previous = self.version_log()?.replay(id)?;
        let previous = (!previous.is_empty()).then_some(previous);
        Ok(Delta::between(previous.as_ref(), current.as_ref()))
    }

    /// Append the current diff to the log, tagged with `extra` metadata.
    ///
    /// Returns `None` when nothing changed since the last recorded version.
    pub fn save_version(&self, entity: &E, extra: Fields) -> SwitchboardResult<Option<VersionDelta>> {
        let Some(id) = entity.id() else {
            return Ok(None);
        };
        let delta = self.diff(entity)?;
        self.version_log()?.append(id, delta, extra)
    }

    /// The last recorded state, rebuilt from the full log.
    ///
    /// An entity that was never saved gets a default instance so it can be
    /// diffed against "nothing"; a saved entity without history gets `None`.
    pub fn previous_version(&self, entity: &E) -> SwitchboardResult<Option<E>> {
        let Some(id) = entity.id() else {
            return E::from_item(Item::default()).map(Some);
        };
        let state = self.version_log()?.replay(id)?;
        if state.is_empty() {
            return Ok(None);
        }
        E::from_item(Item {
            id: Some(id.clone()),
            fields: state,
        })
        .map(Some)
    }

    /// The entity as it was at `at`, or `None` if it did not exist yet.
    pub fn version_at(&self, entity: &E, at: DateTime<Utc>) -> SwitchboardResult<Option<E>> {
        let Some(id) = entity.id() else {
            return Ok(None);
        };
        match self.version_log()?.state_at(id, at)? {
            Some(fields) => E::from_item(Item {
                id: Some(id.clone()),
                fields,
            })
            .map(Some),
            None => Ok(None),
        }
    }

    /// Recorded deltas, most recent first.
    pub fn list_versions(&self, entity: &E) -> SwitchboardResult<Vec<VersionDelta>> {
        let Some(id) = entity.id() else {
            return Ok(Vec::new());
        };
        let mut entries = self.version_log()?.history_for(id)?;
        entries.reverse();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::store::InMemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn repository() -> Repository<Item> {
        Repository::versioned(Arc::new(InMemoryStore::new())).unwrap()
    }

    #[test]
    fn test_first_save_records_full_addition() {
        let repo = repository();
        let item = repo.create(Item::new().with("key", "foo").with("status", 1)).unwrap();

        let versions = repo.list_versions(&item).unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].delta.added.len(), 2);
        assert!(versions[0].delta.changed.is_empty());
        assert_eq!(Some(&versions[0].switch_id), item.id.as_ref());
    }

    #[test]
    fn test_no_op_save_appends_nothing() {
        let repo = repository();
        let mut item = repo.create(Item::new().with("key", "foo")).unwrap();
        let log = repo.version_log().unwrap();
        let before = log.count().unwrap();

        repo.save(&mut item).unwrap();
        assert_eq!(log.count().unwrap(), before);
        assert!(repo.diff(&item).unwrap().is_empty());
    }

    #[test]
    fn test_changes_are_recorded_in_order() {
        let repo = repository();
        let mut item = repo
            .create(Item::new().with("key", "foo").with("status", 1))
            .unwrap();
        item.set("status", 3);
        repo.save(&mut item).unwrap();
        item.remove("status");
        item.set("label", "Foo");
        repo.save(&mut item).unwrap();

        let versions = repo.list_versions(&item).unwrap();
        assert_eq!(versions.len(), 3);
        assert_eq!(versions[0].delta.deleted.get("status"), Some(&json!(3)));
        assert_eq!(versions[0].delta.added.get("label"), Some(&json!("Foo")));
        assert_eq!(
            versions[1].delta.changed.get("status"),
            Some(&(json!(1), json!(3)))
        );
        assert!(versions[0].order_key() > versions[1].order_key());

        let previous = repo.previous_version(&item).unwrap().unwrap();
        assert_eq!(previous.fields, item.fields);
    }

    #[test]
    fn test_previous_version_of_unsaved_entity_is_empty() {
        let repo = repository();
        let fresh = Item::new().with("key", "foo");
        assert_eq!(repo.previous_version(&fresh).unwrap(), Some(Item::default()));
        assert!(repo.list_versions(&fresh).unwrap().is_empty());
    }

    #[test]
    fn test_previous_version_without_history_is_absent() {
        let store = Arc::new(InMemoryStore::new());
        let plain: Repository<Item> = Repository::new(store.clone());
        let item = plain.create(Item::new().with("key", "foo")).unwrap();

        let repo: Repository<Item> = Repository::versioned(store).unwrap();
        assert_eq!(repo.previous_version(&item).unwrap(), None);
    }

    #[test]
    fn test_removal_records_full_deletion_and_keeps_log() {
        let repo = repository();
        let item = repo.create(Item::new().with("key", "foo")).unwrap();
        repo.delete(&item).unwrap();

        let versions = repo.list_versions(&item).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].delta.deleted.get("key"), Some(&json!("foo")));
        assert_eq!(repo.previous_version(&item).unwrap(), None);
    }

    #[test]
    fn test_save_version_extra_metadata() {
        let repo = repository();
        let mut item = repo.create(Item::new().with("key", "foo")).unwrap();
        item.set("status", 2);
        repo.store().save(&mut item.clone()).unwrap();

        let mut extra = Fields::new();
        extra.insert("username".into(), json!("alice"));
        let entry = repo.save_version(&item, extra).unwrap().unwrap();
        assert_eq!(entry.extra.get("username"), Some(&json!("alice")));
        assert_eq!(repo.list_versions(&item).unwrap()[0], entry);
    }

    #[test]
    fn test_save_version_rejects_reserved_metadata() {
        let repo = repository();
        let mut item = repo.create(Item::new().with("key", "foo")).unwrap();
        item.set("status", 2);
        repo.store().save(&mut item.clone()).unwrap();
        let log = repo.version_log().unwrap();

        for (name, value) in [("id", json!(0)), ("timestamp", json!("yesterday"))] {
            let mut extra = Fields::new();
            extra.insert("username".into(), json!("alice"));
            extra.insert(name.into(), value);
            let err = repo.save_version(&item, extra).unwrap_err();
            assert_eq!(err.code(), ErrorCode::ValReservedField);
            assert_eq!(log.count().unwrap(), 1);
        }

        // history stays readable and the pending change is still recorded
        assert_eq!(repo.list_versions(&item).unwrap().len(), 1);
        let mut extra = Fields::new();
        extra.insert("username".into(), json!("alice"));
        extra.insert("reason".into(), json!("rollout"));
        let entry = repo.save_version(&item, extra).unwrap().unwrap();
        assert_eq!(entry.extra.get("reason"), Some(&json!("rollout")));
        assert_eq!(entry.sequence, 1);

        item.set("status", 3);
        repo.save(&mut item).unwrap();
        assert_eq!(repo.list_versions(&item).unwrap().len(), 3);
        assert_eq!(repo.previous_version(&item).unwrap().unwrap().fields, item.fields);
    }

    #[test]
    fn test_version_at() {
        let repo = repository();
        let mut item = repo.create(Item::new().with("key", "foo")).unwrap();
        let first = repo.list_versions(&item).unwrap()[0].timestamp;
        item.set("status", 3);
        repo.save(&mut item).unwrap();

        let before = first - chrono::Duration::seconds(1);
        assert_eq!(repo.version_at(&item, before).unwrap(), None);
        let latest = repo.version_at(&item, Utc::now()).unwrap().unwrap();
        assert_eq!(latest.get("status"), Some(&json!(3)));
    }
}
