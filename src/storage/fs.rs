// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File primitives over the application's private data directory.
//!
//! Confidentiality at rest comes from the platform (app sandbox plus
//! file-based encryption). Every file this module creates is owner-only on
//! Unix, and JSON records are replaced atomically through a sibling `.tmp`
//! file. Reads of a missing file return `None` rather than an error.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use super::StoragePaths;

#[derive(Debug)]
pub enum StorageError {
    Io(io::Error),
    Json(serde_json::Error),
    /// A guid or alias that cannot be used as a file name.
    InvalidName(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "storage I/O failed: {e}"),
            StorageError::Json(e) => write!(f, "stored record is not valid JSON: {e}"),
            StorageError::InvalidName(name) => write!(f, "{name:?} is not a valid storage name"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Json(e) => Some(e),
            StorageError::InvalidName(_) => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Json(e)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// `Ok(None)` for a missing file, otherwise the I/O result.
fn absent_as_none<T>(result: io::Result<T>) -> StorageResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Handle on an opened data directory.
///
/// Only obtainable through [`LocalStorage::open`], so the directory layout
/// always exists.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    paths: StoragePaths,
}

impl LocalStorage {
    /// Create the directory layout under `paths` if needed. Idempotent.
    pub fn open(paths: StoragePaths) -> StorageResult<Self> {
        fs::create_dir_all(paths.connections_dir())?;
        fs::create_dir_all(paths.keys_dir())?;
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn read_json<T: DeserializeOwned>(
        &self,
        path: impl AsRef<Path>,
    ) -> StorageResult<Option<T>> {
        match absent_as_none(File::open(path.as_ref()))? {
            Some(file) => Ok(Some(serde_json::from_reader(BufReader::new(file))?)),
            None => Ok(None),
        }
    }

    /// Replace the JSON record at `path`.
    pub fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> StorageResult<()> {
        let path = path.as_ref();
        let staging = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(create_private_file(&staging)?);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }
        fs::rename(&staging, path)?;
        Ok(())
    }

    pub fn read_bytes(&self, path: impl AsRef<Path>) -> StorageResult<Option<Vec<u8>>> {
        absent_as_none(fs::read(path.as_ref()))
    }

    /// Write key material or other secrets to an owner-only file.
    ///
    /// Like [`Self::write_json`], the previous content stays intact until
    /// the new bytes are synced.
    pub fn write_secret(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        let path = path.as_ref();
        let staging = path.with_extension("tmp");
        {
            let mut file = create_private_file(&staging)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&staging, path)?;
        Ok(())
    }

    /// Returns whether the file existed.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> StorageResult<bool> {
        Ok(absent_as_none(fs::remove_file(path.as_ref()))?.is_some())
    }

    /// Remove a directory tree. Returns whether it existed.
    pub fn remove_dir(&self, path: impl AsRef<Path>) -> StorageResult<bool> {
        Ok(absent_as_none(fs::remove_dir_all(path.as_ref()))?.is_some())
    }

    /// Stems of the files in `dir` ending in `.{extension}`.
    pub fn file_stems(&self, dir: impl AsRef<Path>, extension: &str) -> StorageResult<Vec<String>> {
        let Some(entries) = absent_as_none(fs::read_dir(dir.as_ref()))? else {
            return Ok(Vec::new());
        };

        let mut stems = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != extension) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }
        Ok(stems)
    }

    /// Names of the directories directly under `dir`.
    pub fn subdirectories(&self, dir: impl AsRef<Path>) -> StorageResult<Vec<String>> {
        let Some(entries) = absent_as_none(fs::read_dir(dir.as_ref()))? else {
            return Ok(Vec::new());
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }
}

fn create_private_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, LocalStorage) {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::open(StoragePaths::new(temp.path())).unwrap();
        (temp, storage)
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Record {
        guid: String,
        seen: u32,
    }

    #[test]
    fn open_creates_layout_and_is_idempotent() {
        let (temp, storage) = open_temp();
        assert!(storage.paths().connections_dir().is_dir());
        assert!(storage.paths().keys_dir().is_dir());
        LocalStorage::open(StoragePaths::new(temp.path())).unwrap();
    }

    #[test]
    fn json_records_replace_atomically() {
        let (_temp, storage) = open_temp();
        let path = storage.paths().connection("guid-1");
        assert_eq!(storage.read_json::<Record>(&path).unwrap(), None);

        for seen in [1, 2] {
            let record = Record {
                guid: "guid-1".to_string(),
                seen,
            };
            storage.write_json(&path, &record).unwrap();
            assert_eq!(storage.read_json(&path).unwrap(), Some(record));
        }
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn corrupt_json_is_a_json_error() {
        let (_temp, storage) = open_temp();
        let path = storage.paths().connection("broken");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            storage.read_json::<Record>(&path),
            Err(StorageError::Json(_))
        ));
    }

    #[test]
    fn secrets_are_owner_only() {
        let (_temp, storage) = open_temp();
        let path = storage.paths().private_key("guid-1");
        storage.write_secret(&path, b"old").unwrap();
        storage.write_secret(&path, b"\x00key\x01").unwrap();
        assert_eq!(storage.read_bytes(&path).unwrap().unwrap(), b"\x00key\x01");
        assert!(!path.with_extension("tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o077, 0);
        }
    }

    #[test]
    fn removals_report_existence() {
        let (_temp, storage) = open_temp();
        let key = storage.paths().private_key("gone");
        storage.write_secret(&key, b"k").unwrap();

        assert!(storage.remove_dir(storage.paths().key_dir("gone")).unwrap());
        assert!(!storage.remove_dir(storage.paths().key_dir("gone")).unwrap());
        assert_eq!(storage.read_bytes(&key).unwrap(), None);

        let record = storage.paths().connection("c");
        storage.write_json(&record, &1).unwrap();
        assert!(storage.remove_file(&record).unwrap());
        assert!(!storage.remove_file(&record).unwrap());
    }

    #[test]
    fn listings_filter_by_kind() {
        let (_temp, storage) = open_temp();
        for guid in ["c-1", "c-2"] {
            storage.write_json(storage.paths().connection(guid), &guid).unwrap();
        }
        fs::write(storage.paths().connections_dir().join("notes.txt"), "x").unwrap();
        storage
            .write_secret(storage.paths().secret_key("alias-1"), b"{}")
            .unwrap();

        let mut stems = storage
            .file_stems(storage.paths().connections_dir(), "json")
            .unwrap();
        stems.sort();
        assert_eq!(stems, vec!["c-1", "c-2"]);
        assert_eq!(
            storage.subdirectories(storage.paths().keys_dir()).unwrap(),
            vec!["alias-1"]
        );
        assert!(storage.subdirectories(storage.paths().root().join("absent")).unwrap().is_empty());
    }
}
