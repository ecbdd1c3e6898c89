// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Small preference values (flags and short strings) kept next to the
//! connection records in `{root}/preferences.json`.

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use serde_json::Value;

use super::{LocalStorage, StorageResult};

pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Remove a value. Idempotent.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Boolean flag; absent or non-boolean values read as `false`.
    fn flag(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn set_flag(&self, key: &str, enabled: bool) -> StorageResult<()> {
        self.set(key, Value::Bool(enabled))
    }

    fn string(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self
            .get(key)?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    fn set_string(&self, key: &str, value: &str) -> StorageResult<()> {
        self.set(key, Value::String(value.to_string()))
    }
}

type PreferenceMap = BTreeMap<String, Value>;

/// File-backed preferences. Every mutation rewrites the whole file.
pub struct FilePreferenceStore {
    storage: LocalStorage,
    write_lock: Mutex<()>,
}

impl FilePreferenceStore {
    pub fn new(storage: LocalStorage) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> StorageResult<PreferenceMap> {
        Ok(self
            .storage
            .read_json(self.storage.paths().preferences())?
            .unwrap_or_default())
    }

    fn update(&self, apply: impl FnOnce(&mut PreferenceMap)) -> StorageResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.load()?;
        apply(&mut map);
        self.storage.write_json(self.storage.paths().preferences(), &map)
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.update(|map| {
            map.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.update(|map| {
            map.remove(key);
        })
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceStore {
    values: RwLock<PreferenceMap>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for InMemoryPreferenceStore {
    fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn exercise(store: &dyn PreferenceStore) {
        assert!(!store.flag("biometric_enabled").unwrap());
        store.set_flag("biometric_enabled", true).unwrap();
        assert!(store.flag("biometric_enabled").unwrap());

        store.set_string("passcode", "c2VhbGVk").unwrap();
        assert_eq!(store.string("passcode").unwrap().as_deref(), Some("c2VhbGVk"));
        // wrong type reads as unset
        assert!(!store.flag("passcode").unwrap());

        store.remove("passcode").unwrap();
        store.remove("passcode").unwrap();
        assert_eq!(store.string("passcode").unwrap(), None);
        assert!(store.flag("biometric_enabled").unwrap());
    }

    #[test]
    fn in_memory_store() {
        exercise(&InMemoryPreferenceStore::new());
    }

    #[test]
    fn file_store() {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::open(StoragePaths::new(temp.path())).unwrap();
        let store = FilePreferenceStore::new(storage.clone());
        exercise(&store);

        let reopened = FilePreferenceStore::new(storage);
        assert!(reopened.flag("biometric_enabled").unwrap());
    }
}
