//! SQLite backend.
//!
//! Several namespaces can share one database file. Every batch runs inside a
//! single transaction.

use crate::base::neterror::NetError;
use crate::storage::{BatchOp, KeyValueStore, WriteBatch};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (namespace, key)
)";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    namespace: String,
}

impl SqliteStore {
    /// Open the database at `path`, scoping all reads and writes to `namespace`.
    pub fn open(path: impl AsRef<Path>, namespace: impl Into<String>) -> Result<Self, NetError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, namespace)
    }

    pub fn open_in_memory(namespace: impl Into<String>) -> Result<Self, NetError> {
        Self::with_connection(Connection::open_in_memory()?, namespace)
    }

    fn with_connection(conn: Connection, namespace: impl Into<String>) -> Result<Self, NetError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            namespace: namespace.into(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, NetError> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM kv WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), NetError> {
        if batch.is_empty() {
            return Ok(());
        }
        let (clear, ops) = batch.into_parts();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        if clear {
            tx.execute("DELETE FROM kv WHERE namespace = ?1", params![self.namespace])?;
        }
        for op in ops {
            match op {
                BatchOp::Put(key, value) => {
                    tx.execute(
                        "INSERT OR REPLACE INTO kv (namespace, key, value) VALUES (?1, ?2, ?3)",
                        params![self.namespace, key, value],
                    )?;
                }
                BatchOp::Remove(key) => {
                    tx.execute(
                        "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
                        params![self.namespace, key],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, NetError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT key FROM kv WHERE namespace = ?1 ORDER BY key")?;
        let rows = stmt.query_map(params![self.namespace], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }
}
