// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secure key store capability and its in-memory implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use zeroize::Zeroizing;

use super::KeyStoreError;

/// Key material as handed to the platform store.
#[derive(Clone)]
pub enum StoredKey {
    /// RSA private key, PKCS#8 DER
    RsaPrivate { pkcs8_der: Zeroizing<Vec<u8>> },
    /// AES-256 secret
    Aes256 {
        secret: Zeroizing<Vec<u8>>,
        biometric_gated: bool,
    },
}

impl std::fmt::Debug for StoredKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoredKey::RsaPrivate { .. } => f.write_str("StoredKey::RsaPrivate([REDACTED])"),
            StoredKey::Aes256 {
                biometric_gated, ..
            } => write!(
                f,
                "StoredKey::Aes256([REDACTED], biometric_gated: {biometric_gated})"
            ),
        }
    }
}

/// Platform secure storage for key material, addressed by alias.
///
/// Implementations are responsible for at-rest protection and for
/// serializing concurrent access. `put` replaces any existing entry.
pub trait SecureKeyStore: Send + Sync {
    fn put(&self, alias: &str, key: StoredKey) -> Result<(), KeyStoreError>;

    fn get(&self, alias: &str) -> Result<Option<StoredKey>, KeyStoreError>;

    fn contains(&self, alias: &str) -> Result<bool, KeyStoreError> {
        Ok(self.get(alias)?.is_some())
    }

    /// Remove an entry. Removing an absent alias is not an error.
    fn remove(&self, alias: &str) -> Result<(), KeyStoreError>;

    fn aliases(&self) -> Result<Vec<String>, KeyStoreError>;
}

/// Process-local key store for tests and ephemeral sessions.
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<String, StoredKey>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> KeyStoreError {
    KeyStoreError::Unavailable("key store lock poisoned".to_string())
}

impl SecureKeyStore for InMemoryKeyStore {
    fn put(&self, alias: &str, key: StoredKey) -> Result<(), KeyStoreError> {
        self.keys
            .write()
            .map_err(|_| poisoned())?
            .insert(alias.to_string(), key);
        Ok(())
    }

    fn get(&self, alias: &str) -> Result<Option<StoredKey>, KeyStoreError> {
        Ok(self.keys.read().map_err(|_| poisoned())?.get(alias).cloned())
    }

    fn contains(&self, alias: &str) -> Result<bool, KeyStoreError> {
        Ok(self
            .keys
            .read()
            .map_err(|_| poisoned())?
            .contains_key(alias))
    }

    fn remove(&self, alias: &str) -> Result<(), KeyStoreError> {
        self.keys.write().map_err(|_| poisoned())?.remove(alias);
        Ok(())
    }

    fn aliases(&self) -> Result<Vec<String>, KeyStoreError> {
        let mut aliases: Vec<String> = self
            .keys
            .read()
            .map_err(|_| poisoned())?
            .keys()
            .cloned()
            .collect();
        aliases.sort();
        Ok(aliases)
    }
}
