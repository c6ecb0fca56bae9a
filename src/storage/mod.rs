//! Durable key-value storage used by the cookie store.
//!
//! The cookie store only needs string get/put/remove/clear inside one
//! namespace. Writes are grouped into a [`WriteBatch`] and applied in a single
//! call, so each logical update reaches the backend as one flush.
//!
//! | Backend | Type | Durability |
//! |---------|------|------------|
//! | Memory | [`InMemoryStore`](in_memory::InMemoryStore) | process lifetime |
//! | JSON file | [`JsonFileStore`](json::JsonFileStore) | file rewritten per batch |
//! | SQLite | [`SqliteStore`](sqlite::SqliteStore) | one transaction per batch |

pub mod in_memory;
pub mod json;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use json::JsonFileStore;
pub use sqlite::SqliteStore;

use crate::base::neterror::NetError;

/// One mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put(String, String),
    Remove(String),
}

/// A group of writes applied atomically by [`KeyValueStore::apply`].
///
/// When `clear` is set the namespace is emptied first, then `ops` run in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    clear: bool,
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
        self
    }

    pub fn remove(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::Remove(key.into()));
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.clear = true;
        self
    }

    pub fn is_clear(&self) -> bool {
        self.clear
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        !self.clear && self.ops.is_empty()
    }

    pub fn into_parts(self) -> (bool, Vec<BatchOp>) {
        (self.clear, self.ops)
    }
}

/// String-keyed durable storage scoped to a single namespace.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Missing keys are `Ok(None)`.
    fn get(&self, key: &str) -> Result<Option<String>, NetError>;

    /// Apply a batch of writes as one flush.
    fn apply(&self, batch: WriteBatch) -> Result<(), NetError>;

    /// All keys currently stored in the namespace.
    fn keys(&self) -> Result<Vec<String>, NetError>;

    fn put(&self, key: &str, value: &str) -> Result<(), NetError> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.apply(batch)
    }

    fn remove(&self, key: &str) -> Result<(), NetError> {
        let mut batch = WriteBatch::new();
        batch.remove(key);
        self.apply(batch)
    }

    fn clear(&self) -> Result<(), NetError> {
        let mut batch = WriteBatch::new();
        batch.clear();
        self.apply(batch)
    }
}

/// Apply a batch to an in-memory map. Shared by the memory and JSON backends.
pub(crate) fn apply_to_map(
    map: &mut std::collections::BTreeMap<String, String>,
    batch: WriteBatch,
) {
    let (clear, ops) = batch.into_parts();
    if clear {
        map.clear();
    }
    for op in ops {
        match op {
            BatchOp::Put(k, v) => {
                map.insert(k, v);
            }
            BatchOp::Remove(k) => {
                map.remove(&k);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_batch_clear_runs_before_ops() {
        let mut map = BTreeMap::new();
        map.insert("old".to_string(), "1".to_string());

        let mut batch = WriteBatch::new();
        batch.put("new", "2").clear();
        apply_to_map(&mut map, batch);

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("new").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_empty_batch() {
        assert!(WriteBatch::new().is_empty());
        let mut batch = WriteBatch::new();
        batch.clear();
        assert!(!batch.is_empty());
    }
}
