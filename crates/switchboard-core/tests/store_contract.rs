//! Integration tests for the store contract.
//!
//! The same suite runs against every backend.

use serde_json::json;
use switchboard_core::{Fields, InMemoryStore, Item, ItemId, Lookup, SqliteStore, Store};

const DATE_CREATED: &str = "2018-03-01T12:00:00Z";
const NEXT_DAY: &str = "2018-03-02T12:00:00Z";

fn item(key: &str, status: i64, date_created: &str, value: &str) -> Item {
    Item::new()
        .with("key", key)
        .with("status", status)
        .with("date_created", date_created)
        .with("value", json!({ "json": value }))
}

fn saved(store: &dyn Store, mut item: Item) -> Item {
    store.save(&mut item).unwrap();
    item
}

fn check_save_assigns_fresh_ids(store: &dyn Store) {
    let mut first = item("foo", 42, DATE_CREATED, "value");
    let id = store.save(&mut first).unwrap();
    assert_eq!(first.id.as_ref(), Some(&id));

    let second = saved(store, item("bar", 47, DATE_CREATED, "value"));
    assert_ne!(second.id, first.id);

    let got = store.get(&Lookup::by_id(id)).unwrap().unwrap();
    assert_eq!(got, first);
    assert!(got.get("id").is_none());
}

fn check_get(store: &dyn Store) {
    let item0 = saved(store, item("foo", 42, DATE_CREATED, "value"));
    let item1 = saved(store, item("bar", 47, DATE_CREATED, "value"));
    let id1 = item1.id.clone().unwrap();

    let cases = [
        (Lookup::by_id(id1.clone()), Some(item1.clone())),
        (Lookup::by_id(4700), None),
        (Lookup::all().eq("key", "foo"), Some(item0.clone())),
        (Lookup::all().eq("key", "foo").eq("status", 0), None),
        (
            Lookup::all().eq("key", "bar").eq("date_created", DATE_CREATED),
            Some(item1.clone()),
        ),
        (Lookup::all().eq("missing", "foo"), None),
        // An id filter short-circuits the others.
        (
            Lookup::by_id(id1).eq("key", "something else"),
            Some(item1.clone()),
        ),
    ];
    for (lookup, want) in cases {
        assert_eq!(store.get(&lookup).unwrap(), want, "lookup {:?}", lookup);
    }
}

fn check_filter(store: &dyn Store) {
    let item0 = saved(store, item("foo", 42, DATE_CREATED, "value"));
    let item1 = saved(store, item("bar", 47, DATE_CREATED, "value2"));
    let item2 = saved(store, item("another key", 0, NEXT_DAY, "value"));

    let cases = [
        (Lookup::by_id(item2.id.clone().unwrap()), vec![item2.clone()]),
        (Lookup::by_id(4700), vec![]),
        (
            Lookup::all().eq("date_created", DATE_CREATED),
            vec![item0.clone(), item1.clone()],
        ),
        (Lookup::all().eq("key", "foo").eq("status", 0), vec![]),
        (
            Lookup::all().eq("value", json!({ "json": "value" })),
            vec![item0.clone(), item2.clone()],
        ),
        (Lookup::all(), vec![item0.clone(), item1.clone(), item2.clone()]),
    ];
    for (lookup, want) in cases {
        assert_eq!(store.filter(&lookup).unwrap(), want, "lookup {:?}", lookup);
    }
}

fn check_remove(store: &dyn Store) {
    let item0 = saved(store, item("foo", 42, DATE_CREATED, "value"));
    let item1 = saved(store, item("bar", 47, DATE_CREATED, "value2"));
    let item2 = saved(store, item("another key", 0, NEXT_DAY, "value"));
    let item3 = saved(store, item("spam", 0, DATE_CREATED, "value"));

    assert_eq!(
        store.filter(&Lookup::all()).unwrap(),
        vec![item0.clone(), item1.clone(), item2.clone(), item3.clone()]
    );

    assert_eq!(store.remove(&Lookup::by_id(item0.id.clone().unwrap())).unwrap(), 1);
    assert_eq!(
        store.filter(&Lookup::all()).unwrap(),
        vec![item1.clone(), item2, item3]
    );

    assert_eq!(store.remove(&Lookup::all().eq("status", 0)).unwrap(), 2);
    assert_eq!(store.filter(&Lookup::all()).unwrap(), vec![item1]);

    assert_eq!(store.remove(&Lookup::all().eq("status", 0)).unwrap(), 0);
    assert_eq!(store.remove(&Lookup::all()).unwrap(), 1);
    assert!(store.filter(&Lookup::all()).unwrap().is_empty());
}

fn check_count(store: &dyn Store) {
    assert_eq!(store.count().unwrap(), 0);
    saved(store, item("foo", 42, DATE_CREATED, "value"));
    saved(store, item("bar", 47, DATE_CREATED, "value2"));
    assert_eq!(store.count().unwrap(), 2);
}

fn check_update_in_place(store: &dyn Store) {
    let mut first = saved(store, item("foo", 42, DATE_CREATED, "value"));
    saved(store, item("bar", 47, DATE_CREATED, "value"));

    first.set("status", 3);
    first.remove("value");
    let id = store.save(&mut first).unwrap();
    assert_eq!(Some(&id), first.id.as_ref());
    assert_eq!(store.count().unwrap(), 2);

    let got = store.get(&Lookup::by_id(id)).unwrap().unwrap();
    assert_eq!(got.get("status"), Some(&json!(3)));
    assert!(got.get("value").is_none());
}

fn check_get_or_create(store: &dyn Store) {
    let mut defaults = Fields::new();
    defaults.insert("status".into(), json!(42));
    defaults.insert("date_created".into(), json!(DATE_CREATED));
    defaults.insert("value".into(), json!({ "json": "value" }));
    let lookup = Lookup::all().eq("key", "foo");

    let (created_item, created) = store.get_or_create(defaults.clone(), &lookup).unwrap();
    assert!(created);
    let id = created_item.id.clone().unwrap();
    assert_eq!(
        created_item.to_json(),
        json!({
            "key": "foo",
            "status": 42,
            "date_created": DATE_CREATED,
            "value": { "json": "value" },
            "id": id.to_value(),
        })
    );

    let (found, created) = store.get_or_create(defaults, &lookup).unwrap();
    assert!(!created);
    assert_eq!(found, created_item);
    assert_eq!(store.count().unwrap(), 1);
}

fn check_defaults_win_over_lookup(store: &dyn Store) {
    let mut defaults = Fields::new();
    defaults.insert("status".into(), json!(3));
    let lookup = Lookup::all().eq("key", "foo").eq("status", 1);

    let (item, created) = store.get_or_create(defaults, &lookup).unwrap();
    assert!(created);
    assert_eq!(item.get("status"), Some(&json!(3)));
}

fn check_unusable_id_matches_nothing(store: &dyn Store) {
    for key in ["foo", "bar", "baz"] {
        saved(store, item(key, 0, DATE_CREATED, "value"));
    }

    for value in [json!(1.5), json!(true), json!({"id": 1}), json!(u64::MAX)] {
        let lookup = Lookup::all().eq("id", value);
        assert_eq!(store.get(&lookup).unwrap(), None);
        assert!(store.filter(&lookup).unwrap().is_empty());
        assert_eq!(store.remove(&lookup).unwrap(), 0);
        assert!(store.get_or_create(Fields::new(), &lookup).is_err());
    }
    assert_eq!(store.count().unwrap(), 3);
}

fn check_versioned_is_stable(store: &dyn Store) {
    let first = store.versioned().unwrap();
    let second = store.versioned().unwrap();
    first
        .save(&mut Item::new().with("switch_id", 1).with("delta", json!({})))
        .unwrap();
    assert_eq!(second.count().unwrap(), 1);
    assert_eq!(store.count().unwrap(), 0);
}

macro_rules! store_contract {
    ($backend:ident, $make:expr) => {
        mod $backend {
            use super::*;

            #[test]
            fn save_assigns_fresh_ids() {
                check_save_assigns_fresh_ids(&$make);
            }

            #[test]
            fn get() {
                check_get(&$make);
            }

            #[test]
            fn filter() {
                check_filter(&$make);
            }

            #[test]
            fn remove() {
                check_remove(&$make);
            }

            #[test]
            fn count() {
                check_count(&$make);
            }

            #[test]
            fn update_in_place() {
                check_update_in_place(&$make);
            }

            #[test]
            fn get_or_create() {
                check_get_or_create(&$make);
            }

            #[test]
            fn defaults_win_over_lookup() {
                check_defaults_win_over_lookup(&$make);
            }

            #[test]
            fn unusable_id_matches_nothing() {
                check_unusable_id_matches_nothing(&$make);
            }

            #[test]
            fn versioned_is_stable() {
                check_versioned_is_stable(&$make);
            }
        }
    };
}

store_contract!(memory, InMemoryStore::new());
store_contract!(sqlite, SqliteStore::in_memory("switchboard").unwrap());

#[test]
fn sqlite_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("switchboard.db");

    let id = {
        let store = SqliteStore::new(&path, "switchboard").unwrap();
        let mut foo = item("foo", 42, DATE_CREATED, "value");
        let id = store.save(&mut foo).unwrap();
        store
            .versioned()
            .unwrap()
            .save(&mut Item::new().with("switch_id", id.to_value()))
            .unwrap();
        id
    };

    let store = SqliteStore::new(&path, "switchboard").unwrap();
    let got = store.get(&Lookup::by_id(id.clone())).unwrap().unwrap();
    assert_eq!(got.get("key"), Some(&json!("foo")));
    assert_eq!(store.versioned().unwrap().count().unwrap(), 1);
    assert!(matches!(id, ItemId::Int(_)));
}
