use crate::base::neterror::NetError;
use crate::storage::{apply_to_map, KeyValueStore, WriteBatch};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Volatile key-value store. Used in tests and for sessions that must not touch disk.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, NetError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), NetError> {
        apply_to_map(&mut self.entries.write(), batch);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, NetError> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}
