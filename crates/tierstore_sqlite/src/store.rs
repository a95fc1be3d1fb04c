// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tierstore_tier::{EntityKey, EntityRecord, Error, FieldCondition, RelationalStore};

use crate::predicate;

/// A [`RelationalStore`] over one SQLite table.
///
/// Each record is one row `(id TEXT PRIMARY KEY, body TEXT)` where `id` is the
/// entity key and `body` the record value serialized as JSON. Field
/// conditions are evaluated by SQLite through its JSON functions, so only the
/// matching rows are read back.
///
/// Statements run on tokio's blocking thread pool, one at a time per store.
/// Clones share the same connection.
///
/// # Examples
///
/// ```
/// use serde_json::{json, Value};
/// use tierstore_sqlite::SqliteStore;
/// use tierstore_tier::{EntityRecord, FieldCondition, Gid, KeyDomain, RelationalStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tierstore_tier::Error> {
/// let store = SqliteStore::<Value>::open_in_memory("users")?;
/// let record = EntityRecord::new(json!({"name": "Alice", "age": 30}), Gid::new(1));
/// store.create(&record.key(KeyDomain::Integer), &record).await?;
///
/// let adults = store.find_all(&FieldCondition::range("age", 18, 120)).await?;
/// assert_eq!(adults.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct SqliteStore<V> {
    connection: Arc<Mutex<Connection>>,
    table: String,
    _record: PhantomData<fn() -> V>,
}

impl<V> fmt::Debug for SqliteStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStore").field("table", &self.table).finish_non_exhaustive()
    }
}

impl<V> Clone for SqliteStore<V> {
    fn clone(&self) -> Self {
        Self {
            connection: Arc::clone(&self.connection),
            table: self.table.clone(),
            _record: PhantomData,
        }
    }
}

impl<V> SqliteStore<V> {
    /// Opens (or creates) the database file at `path` and ensures `table` exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a table name that is not a plain
    /// identifier and [`Error::BackingStore`] if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, Error> {
        let connection = Connection::open(path).map_err(|err| Error::backing_store("open", err))?;
        Self::with_connection(connection, table)
    }

    /// Opens a private in-memory database and creates `table` in it.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_in_memory(table: &str) -> Result<Self, Error> {
        let connection = Connection::open_in_memory().map_err(|err| Error::backing_store("open", err))?;
        Self::with_connection(connection, table)
    }

    /// Uses an existing connection and ensures `table` exists.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn with_connection(connection: Connection, table: &str) -> Result<Self, Error> {
        let valid = !table.is_empty()
            && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !table.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            return Err(Error::configuration(format!("invalid table name `{table}`")));
        }

        connection
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (id TEXT PRIMARY KEY, body TEXT NOT NULL);"
            ))
            .map_err(|err| Error::backing_store("open", err))?;

        tracing::info!(store.table = table, "sqlite store ready");
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            table: table.to_owned(),
            _record: PhantomData,
        })
    }

    /// Returns the table this store reads and writes.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl<V> SqliteStore<V> {
    /// Runs `work` against the connection on the blocking thread pool.
    async fn interact<T, F>(&self, operation: &'static str, work: F) -> Result<T, Error>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || work(&connection.lock()))
            .await
            .map_err(|err| Error::backing_store(operation, err))?
            .map_err(|err| Error::backing_store(operation, err))
    }
}

fn decode<V: DeserializeOwned>(operation: &'static str, body: &str) -> Result<V, Error> {
    serde_json::from_str(body).map_err(|err| Error::backing_store(operation, err))
}

impl<V> RelationalStore<V> for SqliteStore<V>
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    async fn create(&self, key: &EntityKey, record: &EntityRecord<V>) -> Result<(), Error> {
        let body = serde_json::to_string(record.value()).map_err(Error::serialization)?;
        let sql = format!("INSERT INTO {} (id, body) VALUES (?1, ?2)", self.table);
        let id = key.to_string();

        self.interact("create", move |connection| connection.execute(&sql, params![id, body]))
            .await?;
        Ok(())
    }

    async fn find(&self, key: &EntityKey) -> Result<Option<V>, Error> {
        let sql = format!("SELECT body FROM {} WHERE id = ?1", self.table);
        let id = key.to_string();

        let body: Option<String> = self
            .interact("find", move |connection| {
                connection.query_row(&sql, params![id], |row| row.get(0)).optional()
            })
            .await?;

        body.map(|body| decode("find", &body)).transpose()
    }

    async fn find_all(&self, condition: &FieldCondition) -> Result<Vec<V>, Error> {
        let Some(predicate) = predicate::translate(condition)? else {
            return Ok(Vec::new());
        };
        let sql = format!("SELECT body FROM {} WHERE {} ORDER BY rowid", self.table, predicate.clause);

        let bodies = self
            .interact("find_all", move |connection| {
                let mut statement = connection.prepare(&sql)?;
                let rows = statement.query_map(params_from_iter(predicate.params.iter()), |row| row.get::<_, String>(0))?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .await?;

        tracing::debug!(store.table = %self.table, field = condition.field(), rows = bodies.len(), "sqlite find_all");
        bodies.iter().map(|body| decode("find_all", body)).collect()
    }

    async fn update(&self, key: &EntityKey, fields: Map<String, Value>) -> Result<(), Error> {
        let patch = serde_json::to_string(&fields).map_err(Error::serialization)?;
        let sql = format!("UPDATE {} SET body = json_patch(body, ?2) WHERE id = ?1", self.table);
        let id = key.to_string();

        let changed = self
            .interact("update", move |connection| connection.execute(&sql, params![id, patch]))
            .await?;

        if changed == 0 {
            tracing::debug!(store.table = %self.table, store.key = %key, "sqlite update matched no row");
        }
        Ok(())
    }

    async fn delete(&self, key: &EntityKey) -> Result<(), Error> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", self.table);
        let id = key.to_string();

        self.interact("delete", move |connection| connection.execute(&sql, params![id]))
            .await?;
        Ok(())
    }
}
