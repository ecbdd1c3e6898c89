// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Connection repository.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/connections/{guid}.json
//! ```
//!
//! The channel reads and writes connection records only through
//! [`ConnectionRepository`]; records never contain key material.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::Connection;

use super::{is_safe_component, LocalStorage, StorageError, StorageResult};

/// Persistence seam for connection records.
pub trait ConnectionRepository: Send + Sync {
    /// Look up a connection by its local guid; `None` if absent.
    fn get_by_guid(&self, guid: &str) -> StorageResult<Option<Connection>>;

    /// Insert or replace a connection record.
    fn save(&self, connection: &Connection) -> StorageResult<()>;

    /// Remove a record. Returns whether one existed.
    fn delete(&self, guid: &str) -> StorageResult<bool>;

    /// All records, oldest first.
    fn all(&self) -> StorageResult<Vec<Connection>>;

    /// Records that are currently ACTIVE.
    fn active(&self) -> StorageResult<Vec<Connection>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(Connection::is_active)
            .collect())
    }

    fn has_active_connections(&self) -> StorageResult<bool> {
        Ok(!self.active()?.is_empty())
    }
}

fn sort_oldest_first(connections: &mut [Connection]) {
    connections.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.guid.cmp(&b.guid)));
}

/// File-backed repository.
pub struct FileConnectionRepository {
    storage: LocalStorage,
}

impl FileConnectionRepository {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    fn checked_guid(guid: &str) -> StorageResult<&str> {
        if is_safe_component(guid) {
            Ok(guid)
        } else {
            Err(StorageError::InvalidName(guid.to_string()))
        }
    }
}

impl ConnectionRepository for FileConnectionRepository {
    fn get_by_guid(&self, guid: &str) -> StorageResult<Option<Connection>> {
        let path = self.storage.paths().connection(Self::checked_guid(guid)?);
        self.storage.read_json(path)
    }

    fn save(&self, connection: &Connection) -> StorageResult<()> {
        let path = self
            .storage
            .paths()
            .connection(Self::checked_guid(&connection.guid)?);
        self.storage.write_json(path, connection)
    }

    fn delete(&self, guid: &str) -> StorageResult<bool> {
        let path = self.storage.paths().connection(Self::checked_guid(guid)?);
        self.storage.remove_file(path)
    }

    fn all(&self) -> StorageResult<Vec<Connection>> {
        let guids = self
            .storage
            .file_stems(self.storage.paths().connections_dir(), "json")?;

        let mut connections = Vec::with_capacity(guids.len());
        for guid in &guids {
            match self.get_by_guid(guid) {
                Ok(Some(connection)) => connections.push(connection),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        connection_guid = %guid,
                        error = %e,
                        "Skipping unreadable connection record"
                    );
                }
            }
        }
        sort_oldest_first(&mut connections);
        Ok(connections)
    }
}

/// In-memory repository for tests and ephemeral sessions.
#[derive(Default)]
pub struct InMemoryConnectionRepository {
    records: RwLock<HashMap<String, Connection>>,
}

impl InMemoryConnectionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectionRepository for InMemoryConnectionRepository {
    fn get_by_guid(&self, guid: &str) -> StorageResult<Option<Connection>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(guid).cloned())
    }

    fn save(&self, connection: &Connection) -> StorageResult<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        records.insert(connection.guid.clone(), connection.clone());
        Ok(())
    }

    fn delete(&self, guid: &str) -> StorageResult<bool> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        Ok(records.remove(guid).is_some())
    }

    fn all(&self) -> StorageResult<Vec<Connection>> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut connections: Vec<Connection> = records.values().cloned().collect();
        sort_oldest_first(&mut connections);
        Ok(connections)
    }
}
