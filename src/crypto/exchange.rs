// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! X25519 key agreement for enrollment.
//!
//! Before a connection exists the device has no trusted channel to the
//! provider. The provider publishes an X25519 public key in its
//! configuration; the device generates an ephemeral pair, derives a shared
//! AES-256 key with HKDF-SHA256 and encrypts its fresh RSA public key PEM
//! under it.
//!
//! Bundle layout (algorithm tag [`ENROLLMENT_ALGORITHM`]):
//!
//! | Field | Content |
//! |-------|---------|
//! | `data` | AES-256-CBC ciphertext |
//! | `key` | device ephemeral X25519 public key |
//! | `iv` | 16-byte CBC IV |

use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::keys::{SymmetricKeyHandle, AES_KEY_LEN};
use crate::models::EncryptedBundle;

use super::symmetric::{decrypt_cbc, encrypt_cbc, random_bytes, IV_LEN};
use super::{decode_base64, encode_base64, CryptoError};

/// Algorithm tag carried by enrollment bundles.
pub const ENROLLMENT_ALGORITHM: &str = "X25519-AES-256-CBC";

const HKDF_INFO: &[u8] = b"authenticator-enrollment-v1";
const SHARED_SECRET_ALIAS: &str = "enrollment";

/// An X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DhPublicKey(PublicKey);

impl std::fmt::Debug for DhPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DhPublicKey").field(&self.to_base64()).finish()
    }
}

impl DhPublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(PublicKey::from(bytes))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes: [u8; 32] = decode_base64(encoded)?
            .try_into()
            .map_err(|raw: Vec<u8>| {
                CryptoError::InvalidKey(format!(
                    "X25519 public key must be 32 bytes, got {}",
                    raw.len()
                ))
            })?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_base64(&self) -> String {
        encode_base64(self.0.as_bytes())
    }
}

/// An X25519 key pair. The secret half is zeroized on drop.
pub struct DhKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for DhKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DhKeyPair")
            .field("public", &self.public_key())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl DhKeyPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> DhPublicKey {
        DhPublicKey(self.public)
    }
}

/// Diffie-Hellman agreement followed by HKDF-SHA256 expansion to an AES-256 key.
///
/// Commutative: both sides of an exchange derive the same handle.
pub fn derive_shared_secret(
    local: &DhKeyPair,
    remote: &DhPublicKey,
) -> Result<SymmetricKeyHandle, CryptoError> {
    let shared = local.secret.diffie_hellman(&remote.0);
    if !shared.was_contributory() {
        return Err(CryptoError::WeakSharedSecret);
    }

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut okm = Zeroizing::new([0u8; AES_KEY_LEN]);
    hk.expand(HKDF_INFO, okm.as_mut_slice())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    Ok(SymmetricKeyHandle::new(SHARED_SECRET_ALIAS, *okm, false))
}

/// Encrypt `plaintext` for the provider owning `provider_public`, using a
/// fresh ephemeral key pair.
pub fn seal_for_enrollment(
    plaintext: &[u8],
    provider_public: &DhPublicKey,
) -> Result<EncryptedBundle, CryptoError> {
    let ephemeral = DhKeyPair::generate();
    let secret = derive_shared_secret(&ephemeral, provider_public)?;
    let iv = random_bytes::<IV_LEN>();
    let ciphertext = encrypt_cbc(secret.secret(), &iv, plaintext)?;

    Ok(EncryptedBundle {
        encrypted_data: encode_base64(&ciphertext),
        encrypted_key: ephemeral.public_key().to_base64(),
        encrypted_iv: encode_base64(&iv),
        algorithm: ENROLLMENT_ALGORITHM.to_string(),
    })
}

/// Provider-side inverse of [`seal_for_enrollment`].
pub fn open_enrollment_bundle(
    bundle: &EncryptedBundle,
    provider: &DhKeyPair,
) -> Result<Vec<u8>, CryptoError> {
    if bundle.algorithm != ENROLLMENT_ALGORITHM {
        return Err(CryptoError::UnsupportedAlgorithm(bundle.algorithm.clone()));
    }
    let device_public = DhPublicKey::from_base64(&bundle.encrypted_key)?;
    let iv = decode_base64(&bundle.encrypted_iv)?;
    let ciphertext = decode_base64(&bundle.encrypted_data)?;

    let secret = derive_shared_secret(provider, &device_public)?;
    decrypt_cbc(secret.secret(), &iv, &ciphertext)
}
