// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the on-device storage layout.

use std::path::{Path, PathBuf};

/// Default base directory for persistent storage.
///
/// Mobile shells override this with the application's private data directory.
pub const DATA_ROOT: &str = "./authenticator-data";

/// Storage path utilities for the on-device data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all persisted data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Connection Paths ==========

    /// Directory containing all connection records.
    pub fn connections_dir(&self) -> PathBuf {
        self.root.join("connections")
    }

    /// Path to a connection record, keyed by its local guid.
    pub fn connection(&self, guid: &str) -> PathBuf {
        self.connections_dir().join(format!("{guid}.json"))
    }

    // ========== Key Paths ==========

    /// Directory containing all stored keys.
    pub fn keys_dir(&self) -> PathBuf {
        self.root.join("keys")
    }

    /// Directory for the key material stored under one alias.
    pub fn key_dir(&self, alias: &str) -> PathBuf {
        self.keys_dir().join(alias)
    }

    /// Path to an RSA private key (PKCS#8 PEM).
    pub fn private_key(&self, alias: &str) -> PathBuf {
        self.key_dir(alias).join("private.pem")
    }

    /// Path to a symmetric key record.
    pub fn secret_key(&self, alias: &str) -> PathBuf {
        self.key_dir(alias).join("secret.json")
    }

    // ========== Preference Paths ==========

    /// Path to the preference flags file.
    pub fn preferences(&self) -> PathBuf {
        self.root.join("preferences.json")
    }
}

/// Whether a name is safe to use as a single path component.
///
/// Aliases and guids end up as file or directory names, so anything that
/// could escape the storage root is rejected.
pub fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
