// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File-backed secure key store.
//!
//! ## Storage Layout
//!
//! Each alias lives in its own directory:
//! ```text
//! {root}/keys/{alias}/
//!   private.pem     # RSA private key (PKCS#8 PEM)
//!   secret.json     # or: AES-256 secret + biometric flag
//! ```
//!
//! ## Security
//!
//! - Files are written owner-readable only
//! - Confidentiality at rest is delegated to the platform data protection
//! - Key material is never returned outside the [`KeyManager`](super::KeyManager)

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{decode_base64, encode_base64};
use crate::storage::{is_safe_component, LocalStorage, StorageError};

use super::store::{SecureKeyStore, StoredKey};
use super::KeyStoreError;

const PRIVATE_KEY_TAG: &str = "PRIVATE KEY";
const AES_ALGORITHM: &str = "AES-256";

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct SecretRecord {
    algorithm: String,
    secret: String,
    biometric_gated: bool,
}

/// Key store persisting each alias under the local data directory.
#[derive(Debug, Clone)]
pub struct FileKeyStore {
    storage: LocalStorage,
}

impl FileKeyStore {
    pub fn new(storage: LocalStorage) -> Self {
        Self { storage }
    }

    fn check_alias(alias: &str) -> Result<(), KeyStoreError> {
        if is_safe_component(alias) {
            Ok(())
        } else {
            Err(KeyStoreError::InvalidAlias(alias.to_string()))
        }
    }

    fn corrupt(alias: &str, reason: impl std::fmt::Display) -> KeyStoreError {
        KeyStoreError::Corrupt {
            alias: alias.to_string(),
            reason: reason.to_string(),
        }
    }

    fn clear(&self, alias: &str) -> Result<(), KeyStoreError> {
        self.storage
            .remove_dir(self.storage.paths().key_dir(alias))
            .map_err(unavailable)?;
        Ok(())
    }

    fn read_private_key(&self, alias: &str) -> Result<Option<StoredKey>, KeyStoreError> {
        let Some(raw) = self
            .storage
            .read_bytes(self.storage.paths().private_key(alias))
            .map_err(unavailable)?
        else {
            return Ok(None);
        };
        let raw = Zeroizing::new(raw);
        let parsed = pem::parse(raw.as_slice()).map_err(|e| Self::corrupt(alias, e))?;
        if parsed.tag() != PRIVATE_KEY_TAG {
            return Err(Self::corrupt(
                alias,
                format!("unexpected PEM tag {}", parsed.tag()),
            ));
        }
        Ok(Some(StoredKey::RsaPrivate {
            pkcs8_der: Zeroizing::new(parsed.into_contents()),
        }))
    }

    fn read_secret(&self, alias: &str) -> Result<Option<StoredKey>, KeyStoreError> {
        let record: Option<SecretRecord> = self
            .storage
            .read_json(self.storage.paths().secret_key(alias))
            .map_err(|e| match e {
                StorageError::Json(e) => Self::corrupt(alias, e),
                other => unavailable(other),
            })?;
        let Some(record) = record else {
            return Ok(None);
        };
        if record.algorithm != AES_ALGORITHM {
            return Err(Self::corrupt(
                alias,
                format!("unexpected algorithm {}", record.algorithm),
            ));
        }
        let secret = decode_base64(&record.secret).map_err(|e| Self::corrupt(alias, e))?;
        Ok(Some(StoredKey::Aes256 {
            secret: Zeroizing::new(secret),
            biometric_gated: record.biometric_gated,
        }))
    }
}

fn unavailable(e: StorageError) -> KeyStoreError {
    KeyStoreError::Unavailable(e.to_string())
}

impl SecureKeyStore for FileKeyStore {
    /// The new key is in place before the previous one is removed, so a
    /// failed write leaves the old key readable.
    fn put(&self, alias: &str, key: StoredKey) -> Result<(), KeyStoreError> {
        Self::check_alias(alias)?;
        let paths = self.storage.paths();

        let superseded = match key {
            StoredKey::RsaPrivate { pkcs8_der } => {
                let encoded = Zeroizing::new(pem::encode_config(
                    &pem::Pem::new(PRIVATE_KEY_TAG, pkcs8_der.to_vec()),
                    pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
                ));
                self.storage
                    .write_secret(paths.private_key(alias), encoded.as_bytes())
                    .map_err(unavailable)?;
                paths.secret_key(alias)
            }
            StoredKey::Aes256 {
                secret,
                biometric_gated,
            } => {
                let record = SecretRecord {
                    algorithm: AES_ALGORITHM.to_string(),
                    secret: encode_base64(&secret),
                    biometric_gated,
                };
                self.storage
                    .write_json(paths.secret_key(alias), &record)
                    .map_err(unavailable)?;
                paths.private_key(alias)
            }
        };

        self.storage.remove_file(superseded).map_err(unavailable)?;
        Ok(())
    }

    fn get(&self, alias: &str) -> Result<Option<StoredKey>, KeyStoreError> {
        Self::check_alias(alias)?;
        match self.read_private_key(alias)? {
            Some(key) => Ok(Some(key)),
            None => self.read_secret(alias),
        }
    }

    fn remove(&self, alias: &str) -> Result<(), KeyStoreError> {
        Self::check_alias(alias)?;
        self.clear(alias)
    }

    fn aliases(&self) -> Result<Vec<String>, KeyStoreError> {
        let mut aliases = self
            .storage
            .subdirectories(self.storage.paths().keys_dir())
            .map_err(unavailable)?;
        aliases.sort();
        Ok(aliases)
    }
}
