//! JSON file backend.
//!
//! Keeps the namespace in memory and rewrites the whole file on every batch.
//! The file is written next to the target and renamed into place, so a crash
//! mid-write leaves the previous contents intact.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::storage::{apply_to_map, KeyValueStore, WriteBatch};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk layout.
#[derive(Serialize, Deserialize, Debug, Default)]
struct JsonFile {
    version: u32,
    entries: BTreeMap<String, String>,
}

const FILE_VERSION: u32 = 1;

pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open (or lazily create) a store backed by `path`.
    ///
    /// # Example
    /// ```ignore
    /// let store = JsonFileStore::open("/data/app/cookieprefs.json")?;
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NetError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let json = fs::read_to_string(&path).storage_context(&path.display().to_string())?;
            let file: JsonFile = serde_json::from_str(&json).map_err(NetError::storage)?;
            file.entries
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), NetError> {
        let file = JsonFile {
            version: FILE_VERSION,
            entries: entries.clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(NetError::storage)?;

        let display = self.path.display().to_string();
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).storage_context(&display)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).storage_context(&display)?;
        fs::rename(&tmp, &self.path).storage_context(&display)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, NetError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), NetError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        apply_to_map(&mut next, batch);
        self.flush(&next)?;
        *entries = next;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, NetError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}
