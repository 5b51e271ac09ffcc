//! SQLite store, to be used in production.
//!
//! Each store is one table keyed by an integer primary key, with the item's
//! fields held as a JSON document in `payload`. The paired version store is a
//! second table of the same shape, `<table>_versions`, on the same connection.

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{SwitchboardError, SwitchboardResult};
use crate::store::{seed_item, Store};
use crate::types::{Fields, Item, ItemId, Lookup};

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid table name pattern"));

/// Whether `name` can be used as a table name without quoting issues.
pub fn is_valid_table_name(name: &str) -> bool {
    TABLE_NAME.is_match(name)
}

/// Suffix of the table holding version deltas.
const VERSIONS_SUFFIX: &str = "_versions";

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
    shadow: OnceCell<Arc<SqliteStore>>,
}

impl SqliteStore {
    /// Open (or create) a database file and the store's table.
    ///
    /// The path `:memory:` opens a private in-memory database.
    pub fn new(db_path: impl AsRef<Path>, table: &str) -> SwitchboardResult<Self> {
        let db_path = db_path.as_ref();
        let conn = if db_path.to_str() == Some(":memory:") {
            Connection::open_in_memory()
        } else {
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Connection::open(db_path)
        }
        .map_err(|e| SwitchboardError::Database {
            message: format!("failed to open {}: {}", db_path.display(), e),
            code: crate::error::ErrorCode::DbConnectionFailed,
            source: Some(Box::new(e)),
        })?;

        Self::with_connection(Arc::new(Mutex::new(conn)), table)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory(table: &str) -> SwitchboardResult<Self> {
        Self::new(":memory:", table)
    }

    /// Use an already open connection, creating the table if needed.
    pub fn with_connection(conn: Arc<Mutex<Connection>>, table: &str) -> SwitchboardResult<Self> {
        if !is_valid_table_name(table) {
            return Err(SwitchboardError::invalid_identifier(table));
        }
        let store = Self {
            conn,
            table: table.to_string(),
            shadow: OnceCell::new(),
        };
        store.create_table()?;
        Ok(store)
    }

    /// Name of the backing table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Drop the backing table. The store is unusable afterwards.
    pub fn drop_table(&self) -> SwitchboardResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(r#"DROP TABLE IF EXISTS "{}""#, self.table))?;
        Ok(())
    }

    fn lock(&self) -> SwitchboardResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SwitchboardError::poisoned("sqlite connection"))
    }

    fn create_table(&self) -> SwitchboardResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table}" (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                payload TEXT NOT NULL
            );
            "#,
            table = self.table
        ))?;
        Ok(())
    }

    fn row_id(id: &ItemId) -> SwitchboardResult<i64> {
        id.as_int().ok_or_else(|| {
            SwitchboardError::validation(format!(
                "the sqlite backend only supports integer ids, got '{}'",
                id
            ))
        })
    }

    fn decode(id: i64, payload: &str) -> SwitchboardResult<Item> {
        let fields: Fields = serde_json::from_str(payload)?;
        Ok(Item {
            id: Some(ItemId::Int(id)),
            fields,
        })
    }

    fn write(conn: &Connection, table: &str, item: &mut Item) -> SwitchboardResult<ItemId> {
        let explicit = item.take_id();
        let payload = serde_json::to_string(&item.fields)?;
        let id = match explicit {
            None => {
                conn.execute(
                    &format!(r#"INSERT INTO "{}" (payload) VALUES (?1)"#, table),
                    params![payload],
                )?;
                conn.last_insert_rowid()
            }
            Some(id) => {
                let row_id = Self::row_id(&id)?;
                conn.execute(
                    &format!(
                        r#"INSERT INTO "{}" (id, payload) VALUES (?1, ?2)
                           ON CONFLICT(id) DO UPDATE SET payload = excluded.payload"#,
                        table
                    ),
                    params![row_id, payload],
                )?;
                row_id
            }
        };
        let id = ItemId::Int(id);
        item.id = Some(id.clone());
        Ok(id)
    }

    fn select(conn: &Connection, table: &str, lookup: &Lookup) -> SwitchboardResult<Vec<Item>> {
        if let Some(id) = lookup.id() {
            // A non-integer id can never match an integer primary key.
            let Some(row_id) = id.as_int() else {
                return Ok(Vec::new());
            };
            let payload: Option<String> = conn
                .query_row(
                    &format!(r#"SELECT payload FROM "{}" WHERE id = ?1"#, table),
                    params![row_id],
                    |row| row.get(0),
                )
                .optional()?;
            return payload
                .map(|p| Self::decode(row_id, &p))
                .into_iter()
                .collect();
        }

        let mut stmt = conn.prepare(&format!(
            r#"SELECT id, payload FROM "{}" ORDER BY id ASC"#,
            table
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            let item = Self::decode(id, &payload)?;
            // Field filters are evaluated on the decoded payload so that both
            // backends share one notion of equality.
            if lookup.matches(&item.fields) {
                items.push(item);
            }
        }
        Ok(items)
    }
}

impl Store for SqliteStore {
    fn backend(&self) -> &str {
        "sqlite"
    }

    fn save(&self, item: &mut Item) -> SwitchboardResult<ItemId> {
        let conn = self.lock()?;
        let id = Self::write(&conn, &self.table, item)?;
        tracing::trace!(table = %self.table, id = %id, "saved sqlite item");
        Ok(id)
    }

    fn filter(&self, lookup: &Lookup) -> SwitchboardResult<Vec<Item>> {
        let conn = self.lock()?;
        Self::select(&conn, &self.table, lookup)
    }

    fn remove(&self, lookup: &Lookup) -> SwitchboardResult<usize> {
        let mut conn = self.lock()?;
        if let Some(id) = lookup.id() {
            let Some(row_id) = id.as_int() else {
                return Ok(0);
            };
            let removed = conn.execute(
                &format!(r#"DELETE FROM "{}" WHERE id = ?1"#, self.table),
                params![row_id],
            )?;
            return Ok(removed);
        }
        if lookup.is_empty() {
            let removed = conn.execute(&format!(r#"DELETE FROM "{}""#, self.table), [])?;
            return Ok(removed);
        }

        let tx = conn.transaction()?;
        let matching = Self::select(&tx, &self.table, lookup)?;
        {
            let mut stmt = tx.prepare(&format!(r#"DELETE FROM "{}" WHERE id = ?1"#, self.table))?;
            for item in &matching {
                if let Some(ItemId::Int(row_id)) = item.id {
                    stmt.execute(params![row_id])?;
                }
            }
        }
        tx.commit()?;
        Ok(matching.len())
    }

    fn count(&self) -> SwitchboardResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!(r#"SELECT COUNT(*) FROM "{}""#, self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn versioned(&self) -> SwitchboardResult<Arc<dyn Store>> {
        let shadow = self.shadow.get_or_try_init(|| {
            let table = format!("{}{}", self.table, VERSIONS_SUFFIX);
            SqliteStore::with_connection(self.conn.clone(), &table).map(Arc::new)
        })?;
        let shadow: Arc<dyn Store> = shadow.clone();
        Ok(shadow)
    }

    /// Runs the lookup and the insert in one `IMMEDIATE` transaction, so a
    /// concurrent writer cannot slip in between. Any failure rolls back.
    fn get_or_create(&self, defaults: Fields, lookup: &Lookup) -> SwitchboardResult<(Item, bool)> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| SwitchboardError::transaction(e.into()))?;

        let outcome = (|| -> SwitchboardResult<(Item, bool)> {
            if let Some(found) = Self::select(&tx, &self.table, lookup)?.into_iter().next() {
                return Ok((found, false));
            }
            let mut item = seed_item(defaults, lookup)?;
            Self::write(&tx, &self.table, &mut item)?;
            Ok((item, true))
        })();

        match outcome {
            Ok(result) => {
                tx.commit()
                    .map_err(|e| SwitchboardError::transaction(e.into()))?;
                if result.1 {
                    tracing::debug!(table = %self.table, "get_or_create inserted a new item");
                }
                Ok(result)
            }
            // Dropping the transaction rolls it back.
            Err(e) => Err(SwitchboardError::transaction(e)),
        }
    }
}
