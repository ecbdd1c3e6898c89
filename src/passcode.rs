// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Passcode Vault
//!
//! On-device app lock. The passcode is sealed with AES-256-GCM under the
//! symmetric key `passcode_secure_key` and the Base64 result is kept in the
//! preference store under `passcode`. It never leaves the device.
//!
//! Biometric unlock is a second, optional path: enabling it creates the
//! biometric-gated key `biometric_key` and sets the `biometric_enabled`
//! flag. Unlocking asks the key manager for that key, which runs the
//! platform biometric prompt.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::crypto::{self, CryptoError};
use crate::keys::{KeyManager, KeyStoreError, SymmetricKeyHandle};
use crate::storage::{PreferenceStore, StorageError};

pub const PASSCODE_KEY_ALIAS: &str = "passcode_secure_key";
pub const PASSCODE_PREFERENCE: &str = "passcode";
pub const BIOMETRIC_KEY_ALIAS: &str = "biometric_key";
pub const BIOMETRIC_ENABLED_PREFERENCE: &str = "biometric_enabled";

#[derive(Debug, thiserror::Error)]
pub enum PasscodeError {
    #[error("no passcode has been set")]
    NotSet,

    #[error("passcode must not be empty")]
    Empty,

    #[error("biometric unlock is not enabled")]
    BiometricDisabled,

    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type PasscodeResult<T> = Result<T, PasscodeError>;

pub struct PasscodeVault {
    keys: KeyManager,
    preferences: Arc<dyn PreferenceStore>,
}

impl PasscodeVault {
    pub fn new(keys: KeyManager, preferences: Arc<dyn PreferenceStore>) -> Self {
        Self { keys, preferences }
    }

    pub fn has_passcode(&self) -> PasscodeResult<bool> {
        Ok(self.preferences.string(PASSCODE_PREFERENCE)?.is_some())
    }

    /// Seal and store a new passcode, replacing any previous one.
    pub fn save_passcode(&self, passcode: &str) -> PasscodeResult<()> {
        if passcode.is_empty() {
            return Err(PasscodeError::Empty);
        }
        let key = self.passcode_key()?;
        let sealed = crypto::encrypt_gcm(passcode.as_bytes(), &key)?;
        self.preferences.set_string(PASSCODE_PREFERENCE, &sealed)?;
        info!("Passcode saved");
        Ok(())
    }

    pub fn load_passcode(&self) -> PasscodeResult<Zeroizing<String>> {
        let sealed = self
            .preferences
            .string(PASSCODE_PREFERENCE)?
            .ok_or(PasscodeError::NotSet)?;
        let key = self
            .keys
            .get_symmetric_key_handle(PASSCODE_KEY_ALIAS)?
            .ok_or_else(|| CryptoError::MissingKey(PASSCODE_KEY_ALIAS.to_string()))?;
        let plaintext = Zeroizing::new(crypto::decrypt_gcm(&sealed, &key)?);
        let passcode = std::str::from_utf8(&plaintext)
            .map_err(|e| CryptoError::InvalidPayload(e.to_string()))?;
        Ok(Zeroizing::new(passcode.to_string()))
    }

    /// Compare `candidate` with the stored passcode.
    pub fn verify_passcode(&self, candidate: &str) -> PasscodeResult<bool> {
        let stored = self.load_passcode()?;
        let matches: bool = stored.as_bytes().ct_eq(candidate.as_bytes()).into();
        debug!(matches, "Passcode checked");
        Ok(matches)
    }

    /// Forget the passcode and its key.
    pub fn clear_passcode(&self) -> PasscodeResult<()> {
        self.preferences.remove(PASSCODE_PREFERENCE)?;
        self.keys.delete_key(PASSCODE_KEY_ALIAS)?;
        info!("Passcode cleared");
        Ok(())
    }

    fn passcode_key(&self) -> PasscodeResult<SymmetricKeyHandle> {
        match self.keys.get_symmetric_key_handle(PASSCODE_KEY_ALIAS)? {
            Some(key) => Ok(key),
            None => Ok(self.keys.create_or_replace_symmetric_key(PASSCODE_KEY_ALIAS, false)?),
        }
    }

    pub fn is_biometric_enabled(&self) -> PasscodeResult<bool> {
        Ok(self.preferences.flag(BIOMETRIC_ENABLED_PREFERENCE)?)
    }

    pub fn enable_biometric(&self) -> PasscodeResult<()> {
        self.keys.create_or_replace_symmetric_key(BIOMETRIC_KEY_ALIAS, true)?;
        self.preferences.set_flag(BIOMETRIC_ENABLED_PREFERENCE, true)?;
        info!("Biometric unlock enabled");
        Ok(())
    }

    pub fn disable_biometric(&self) -> PasscodeResult<()> {
        self.preferences.remove(BIOMETRIC_ENABLED_PREFERENCE)?;
        self.keys.delete_key(BIOMETRIC_KEY_ALIAS)?;
        info!("Biometric unlock disabled");
        Ok(())
    }

    /// Unlock through the platform biometric prompt.
    ///
    /// Fails with `KeyStore(BiometricRejected)` when the user is not
    /// recognised.
    pub fn unlock_with_biometric(&self) -> PasscodeResult<()> {
        if !self.is_biometric_enabled()? {
            return Err(PasscodeError::BiometricDisabled);
        }
        self.keys
            .get_symmetric_key_handle(BIOMETRIC_KEY_ALIAS)?
            .ok_or(PasscodeError::BiometricDisabled)?;
        debug!("Unlocked with biometric");
        Ok(())
    }
}
