// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hybrid encryption for payloads exchanged with the backend.
//!
//! A fresh AES-256 key and 16-byte IV encrypt the payload with AES-CBC;
//! key and IV are then each encrypted with RSA PKCS#1 v1.5 under the
//! recipient's public key. All three outputs are Base64.

use rsa::Pkcs1v15Encrypt;
use zeroize::Zeroizing;

use crate::keys::{PrivateKeyHandle, PublicKeyHandle, AES_KEY_LEN};
use crate::models::EncryptedBundle;

use super::symmetric::{decrypt_cbc, encrypt_cbc, random_bytes, IV_LEN};
use super::{decode_base64, encode_base64, CryptoError};

/// Algorithm tag carried by hybrid bundles.
pub const HYBRID_ALGORITHM: &str = "AES-256-CBC";

/// Encrypt `plaintext` for the holder of `recipient`'s private key.
pub fn hybrid_encrypt(
    plaintext: &[u8],
    recipient: &PublicKeyHandle,
) -> Result<EncryptedBundle, CryptoError> {
    let key = Zeroizing::new(random_bytes::<AES_KEY_LEN>());
    let iv = random_bytes::<IV_LEN>();

    let encrypted_data = encrypt_cbc(key.as_slice(), &iv, plaintext)?;

    let mut rng = rand::thread_rng();
    let encrypted_key = recipient
        .rsa()
        .encrypt(&mut rng, Pkcs1v15Encrypt, key.as_slice())
        .map_err(|e| CryptoError::Rsa(e.to_string()))?;
    let encrypted_iv = recipient
        .rsa()
        .encrypt(&mut rng, Pkcs1v15Encrypt, &iv)
        .map_err(|e| CryptoError::Rsa(e.to_string()))?;

    Ok(EncryptedBundle {
        encrypted_data: encode_base64(&encrypted_data),
        encrypted_key: encode_base64(&encrypted_key),
        encrypted_iv: encode_base64(&encrypted_iv),
        algorithm: HYBRID_ALGORITHM.to_string(),
    })
}

/// Inverse of [`hybrid_encrypt`].
///
/// Every failure (corrupt Base64, wrong key, bad padding) comes back as a
/// [`CryptoError`].
pub fn hybrid_decrypt(
    bundle: &EncryptedBundle,
    owner: &PrivateKeyHandle,
) -> Result<Vec<u8>, CryptoError> {
    if !bundle.algorithm.is_empty() && !bundle.algorithm.eq_ignore_ascii_case(HYBRID_ALGORITHM) {
        return Err(CryptoError::UnsupportedAlgorithm(bundle.algorithm.clone()));
    }

    let encrypted_key = decode_base64(&bundle.encrypted_key)?;
    let encrypted_iv = decode_base64(&bundle.encrypted_iv)?;
    let encrypted_data = decode_base64(&bundle.encrypted_data)?;

    let key = Zeroizing::new(
        owner
            .rsa()
            .decrypt(Pkcs1v15Encrypt, &encrypted_key)
            .map_err(|e| CryptoError::Rsa(e.to_string()))?,
    );
    let iv = owner
        .rsa()
        .decrypt(Pkcs1v15Encrypt, &encrypted_iv)
        .map_err(|e| CryptoError::Rsa(e.to_string()))?;

    if key.len() != AES_KEY_LEN || iv.len() != IV_LEN {
        return Err(CryptoError::InvalidKey(format!(
            "unwrapped key/IV have lengths {}/{}",
            key.len(),
            iv.len()
        )));
    }

    decrypt_cbc(&key, &iv, &encrypted_data)
}
