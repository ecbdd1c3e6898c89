// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Key Manager
//!
//! Generates, stores, retrieves and rotates the keys the device holds:
//!
//! - one RSA-2048 keypair per connection, aliased by the connection guid
//! - AES-256 keys under fixed aliases (passcode protection, biometric unlock)
//!
//! Key material never leaves this module except as opaque handles that the
//! [`crypto`](crate::crypto) functions accept. The only exportable form is the
//! public key PEM.
//!
//! ## Collaborators
//!
//! - [`SecureKeyStore`]: platform storage for key material
//!   ([`FileKeyStore`] in production, [`InMemoryKeyStore`] in tests)
//! - [`BiometricVerifier`]: gate for biometric-protected symmetric keys

pub mod file_store;
pub mod store;

use std::sync::Arc;

use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{self, CryptoError};

pub use file_store::FileKeyStore;
pub use store::{InMemoryKeyStore, SecureKeyStore, StoredKey};

/// Modulus size of every generated RSA keypair.
pub const RSA_KEY_BITS: usize = 2048;

/// Length of every generated AES key in bytes.
pub const AES_KEY_LEN: usize = 32;

/// Errors raised by the key manager or the underlying secure store.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("secure key store unavailable: {0}")]
    Unavailable(String),

    #[error("stored key {alias} is corrupt: {reason}")]
    Corrupt { alias: String, reason: String },

    #[error("key generation failed: {0}")]
    Generation(String),

    #[error("invalid key alias: {0}")]
    InvalidAlias(String),

    #[error("key {0} requires biometric verification but no verifier is available")]
    BiometricRequired(String),

    #[error("biometric verification rejected for key {0}")]
    BiometricRejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Rsa2048,
    Aes256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    Signing,
    Encryption,
}

/// External biometric prompt.
pub trait BiometricVerifier: Send + Sync {
    /// Ask the user to verify before `alias` is released. `true` on success.
    fn verify(&self, alias: &str) -> bool;
}

/// Public half of an RSA keypair.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyHandle {
    alias: String,
    key: RsaPublicKey,
}

impl std::fmt::Debug for PublicKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKeyHandle")
            .field("alias", &self.alias)
            .finish_non_exhaustive()
    }
}

impl PublicKeyHandle {
    /// Parse a recipient key from PEM or bare Base64 DER.
    pub fn from_pem(alias: impl Into<String>, pem: &str) -> Result<Self, CryptoError> {
        Ok(Self {
            alias: alias.into(),
            key: crypto::parse_public_key(pem)?,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Rsa2048
    }

    pub fn usages(&self) -> &'static [KeyUsage] {
        &[KeyUsage::Signing, KeyUsage::Encryption]
    }

    /// SubjectPublicKeyInfo PEM, as sent to the backend.
    pub fn to_pem(&self) -> Result<String, CryptoError> {
        crypto::public_key_pem(&self.key)
    }

    pub(crate) fn rsa(&self) -> &RsaPublicKey {
        &self.key
    }
}

/// Private half of an RSA keypair. Never printed, never serialized.
#[derive(Clone)]
pub struct PrivateKeyHandle {
    alias: String,
    key: RsaPrivateKey,
}

impl std::fmt::Debug for PrivateKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKeyHandle")
            .field("alias", &self.alias)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl PrivateKeyHandle {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Rsa2048
    }

    pub fn public_key(&self) -> PublicKeyHandle {
        PublicKeyHandle {
            alias: self.alias.clone(),
            key: self.key.to_public_key(),
        }
    }

    pub(crate) fn rsa(&self) -> &RsaPrivateKey {
        &self.key
    }
}

/// AES-256 key. Compared by value; zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKeyHandle {
    alias: String,
    secret: [u8; AES_KEY_LEN],
    biometric_gated: bool,
}

impl std::fmt::Debug for SymmetricKeyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKeyHandle")
            .field("alias", &self.alias)
            .field("secret", &"[REDACTED]")
            .field("biometric_gated", &self.biometric_gated)
            .finish()
    }
}

impl PartialEq for SymmetricKeyHandle {
    fn eq(&self, other: &Self) -> bool {
        self.secret[..].ct_eq(&other.secret[..]).into()
    }
}

impl Eq for SymmetricKeyHandle {}

impl SymmetricKeyHandle {
    pub(crate) fn new(
        alias: impl Into<String>,
        secret: [u8; AES_KEY_LEN],
        biometric_gated: bool,
    ) -> Self {
        Self {
            alias: alias.into(),
            secret,
            biometric_gated,
        }
    }

    fn from_stored(
        alias: &str,
        secret: &[u8],
        biometric_gated: bool,
    ) -> Result<Self, KeyStoreError> {
        let secret: [u8; AES_KEY_LEN] = secret.try_into().map_err(|_| KeyStoreError::Corrupt {
            alias: alias.to_string(),
            reason: format!("expected {AES_KEY_LEN}-byte secret, got {}", secret.len()),
        })?;
        Ok(Self::new(alias, secret, biometric_gated))
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        KeyAlgorithm::Aes256
    }

    pub fn is_biometric_gated(&self) -> bool {
        self.biometric_gated
    }

    pub(crate) fn secret(&self) -> &[u8; AES_KEY_LEN] {
        &self.secret
    }
}

/// Key lifecycle manager over a platform [`SecureKeyStore`].
///
/// Cheap to clone; clones share the same store.
#[derive(Clone)]
pub struct KeyManager {
    store: Arc<dyn SecureKeyStore>,
    biometric: Option<Arc<dyn BiometricVerifier>>,
}

impl KeyManager {
    pub fn new(store: Arc<dyn SecureKeyStore>) -> Self {
        Self {
            store,
            biometric: None,
        }
    }

    /// Attach the biometric prompt used to release gated keys.
    pub fn with_biometric_verifier(mut self, verifier: Arc<dyn BiometricVerifier>) -> Self {
        self.biometric = Some(verifier);
        self
    }

    /// Generate a fresh RSA-2048 keypair under `alias`.
    ///
    /// **Warning**: an existing keypair under the same alias is replaced and
    /// becomes permanently unrecoverable. Re-enroll its dependents first.
    pub fn create_or_replace_asymmetric_key_pair(
        &self,
        alias: &str,
    ) -> Result<PublicKeyHandle, KeyStoreError> {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), RSA_KEY_BITS)
            .map_err(|e| KeyStoreError::Generation(e.to_string()))?;
        let der = key
            .to_pkcs8_der()
            .map_err(|e| KeyStoreError::Generation(e.to_string()))?;

        if self.store.contains(alias)? {
            warn!(alias = %alias, "Replacing existing keypair");
        }
        self.store.put(
            alias,
            StoredKey::RsaPrivate {
                pkcs8_der: Zeroizing::new(der.as_bytes().to_vec()),
            },
        )?;

        info!(alias = %alias, bits = RSA_KEY_BITS, "Generated RSA keypair");
        Ok(PublicKeyHandle {
            alias: alias.to_string(),
            key: key.to_public_key(),
        })
    }

    /// Generate a fresh AES-256 key under `alias`.
    ///
    /// A biometric-gated key is only released after the verifier approves.
    pub fn create_or_replace_symmetric_key(
        &self,
        alias: &str,
        biometric_gated: bool,
    ) -> Result<SymmetricKeyHandle, KeyStoreError> {
        let mut secret = [0u8; AES_KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut secret);

        self.store.put(
            alias,
            StoredKey::Aes256 {
                secret: Zeroizing::new(secret.to_vec()),
                biometric_gated,
            },
        )?;

        info!(alias = %alias, biometric_gated, "Generated AES-256 key");
        let handle = SymmetricKeyHandle::new(alias, secret, biometric_gated);
        secret.zeroize();
        Ok(handle)
    }

    /// Look up the RSA private key stored under `alias`.
    pub fn get_private_key_handle(
        &self,
        alias: &str,
    ) -> Result<Option<PrivateKeyHandle>, KeyStoreError> {
        match self.store.get(alias)? {
            None => Ok(None),
            Some(StoredKey::RsaPrivate { pkcs8_der }) => {
                let key = RsaPrivateKey::from_pkcs8_der(&pkcs8_der).map_err(|e| {
                    KeyStoreError::Corrupt {
                        alias: alias.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some(PrivateKeyHandle {
                    alias: alias.to_string(),
                    key,
                }))
            }
            Some(StoredKey::Aes256 { .. }) => Err(KeyStoreError::Corrupt {
                alias: alias.to_string(),
                reason: "expected an RSA keypair, found a symmetric key".to_string(),
            }),
        }
    }

    /// Public half of the keypair stored under `alias`.
    pub fn get_public_key_handle(
        &self,
        alias: &str,
    ) -> Result<Option<PublicKeyHandle>, KeyStoreError> {
        Ok(self
            .get_private_key_handle(alias)?
            .map(|private| private.public_key()))
    }

    /// Look up the AES key stored under `alias`, running the biometric
    /// check first when the key is gated.
    pub fn get_symmetric_key_handle(
        &self,
        alias: &str,
    ) -> Result<Option<SymmetricKeyHandle>, KeyStoreError> {
        let (secret, biometric_gated) = match self.store.get(alias)? {
            None => return Ok(None),
            Some(StoredKey::Aes256 {
                secret,
                biometric_gated,
            }) => (secret, biometric_gated),
            Some(StoredKey::RsaPrivate { .. }) => {
                return Err(KeyStoreError::Corrupt {
                    alias: alias.to_string(),
                    reason: "expected a symmetric key, found an RSA keypair".to_string(),
                })
            }
        };

        if biometric_gated {
            let verifier = self
                .biometric
                .as_ref()
                .ok_or_else(|| KeyStoreError::BiometricRequired(alias.to_string()))?;
            if !verifier.verify(alias) {
                debug!(alias = %alias, "Biometric verification rejected");
                return Err(KeyStoreError::BiometricRejected(alias.to_string()));
            }
        }

        SymmetricKeyHandle::from_stored(alias, &secret, biometric_gated).map(Some)
    }

    pub fn key_exists(&self, alias: &str) -> Result<bool, KeyStoreError> {
        self.store.contains(alias)
    }

    /// Delete whatever is stored under `alias`. Deleting an absent key is a no-op.
    pub fn delete_key(&self, alias: &str) -> Result<(), KeyStoreError> {
        self.store.remove(alias)?;
        info!(alias = %alias, "Deleted key");
        Ok(())
    }

    /// Delete the RSA keypairs whose alias is not in `keep`; returns the
    /// removed aliases. Symmetric keys are never touched.
    pub fn delete_orphaned_key_pairs(
        &self,
        keep: &[String],
    ) -> Result<Vec<String>, KeyStoreError> {
        let mut removed = Vec::new();
        for alias in self.store.aliases()? {
            if keep.contains(&alias) {
                continue;
            }
            if let Some(StoredKey::RsaPrivate { .. }) = self.store.get(&alias)? {
                self.store.remove(&alias)?;
                removed.push(alias);
            }
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "Deleted orphaned key pairs");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn manager() -> KeyManager {
        KeyManager::new(Arc::new(InMemoryKeyStore::new()))
    }

    struct Prompt(AtomicBool);

    impl BiometricVerifier for Prompt {
        fn verify(&self, _alias: &str) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn asymmetric_keypair_lifecycle() {
        let keys = manager();
        assert!(keys.get_private_key_handle("guid-1").unwrap().is_none());

        let public = keys.create_or_replace_asymmetric_key_pair("guid-1").unwrap();
        assert_eq!(public.alias(), "guid-1");
        assert!(keys.key_exists("guid-1").unwrap());

        let private = keys.get_private_key_handle("guid-1").unwrap().unwrap();
        assert_eq!(private.public_key(), public);
        assert_eq!(keys.get_public_key_handle("guid-1").unwrap(), Some(public));

        keys.delete_key("guid-1").unwrap();
        assert!(!keys.key_exists("guid-1").unwrap());
        assert!(keys.get_private_key_handle("guid-1").unwrap().is_none());
    }

    #[test]
    fn replacing_a_keypair_changes_the_public_key() {
        let keys = manager();
        let first = keys.create_or_replace_asymmetric_key_pair("guid-1").unwrap();
        let second = keys.create_or_replace_asymmetric_key_pair("guid-1").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn symmetric_key_lookup() {
        let keys = manager();
        let created = keys.create_or_replace_symmetric_key("passcode", false).unwrap();
        let loaded = keys.get_symmetric_key_handle("passcode").unwrap().unwrap();
        assert_eq!(created, loaded);
        assert!(!loaded.is_biometric_gated());
        assert!(keys.get_symmetric_key_handle("absent").unwrap().is_none());
    }

    #[test]
    fn gated_key_requires_verifier() {
        let keys = manager();
        keys.create_or_replace_symmetric_key("biometric_key", true).unwrap();
        assert!(matches!(
            keys.get_symmetric_key_handle("biometric_key"),
            Err(KeyStoreError::BiometricRequired(_))
        ));
    }

    #[test]
    fn gated_key_follows_verifier_answer() {
        let prompt = Arc::new(Prompt(AtomicBool::new(false)));
        let keys = manager().with_biometric_verifier(prompt.clone());
        keys.create_or_replace_symmetric_key("biometric_key", true).unwrap();

        assert!(matches!(
            keys.get_symmetric_key_handle("biometric_key"),
            Err(KeyStoreError::BiometricRejected(_))
        ));

        prompt.0.store(true, Ordering::SeqCst);
        let handle = keys.get_symmetric_key_handle("biometric_key").unwrap().unwrap();
        assert!(handle.is_biometric_gated());
    }

    #[test]
    fn kind_mismatch_is_a_fault() {
        let keys = manager();
        keys.create_or_replace_symmetric_key("alias", false).unwrap();
        assert!(matches!(
            keys.get_private_key_handle("alias"),
            Err(KeyStoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn orphan_cleanup_spares_symmetric_keys() {
        let keys = manager();
        keys.create_or_replace_asymmetric_key_pair("keep").unwrap();
        keys.create_or_replace_asymmetric_key_pair("orphan").unwrap();
        keys.create_or_replace_symmetric_key("passcode_secure_key", false).unwrap();
        keys.create_or_replace_symmetric_key("biometric_key", true).unwrap();

        let removed = keys.delete_orphaned_key_pairs(&["keep".to_string()]).unwrap();
        assert_eq!(removed, vec!["orphan".to_string()]);
        for alias in ["keep", "passcode_secure_key", "biometric_key"] {
            assert!(keys.key_exists(alias).unwrap(), "{alias}");
        }
    }

    #[test]
    fn handles_do_not_print_material() {
        let keys = manager();
        let handle = keys.create_or_replace_symmetric_key("passcode", false).unwrap();
        assert!(format!("{handle:?}").contains("REDACTED"));
    }
}
