// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES primitives.
//!
//! - AES-256-CBC with PKCS#7 padding for payloads exchanged with the backend
//! - AES-256-GCM for data that stays on the device
//!
//! GCM output format: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::keys::SymmetricKeyHandle;

use super::{decode_base64, encode_base64, CryptoError};

type Aes256CbcEnc = cbc::Encryptor<::aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<::aes::Aes256>;

/// AES block (and CBC IV) size in bytes.
pub const IV_LEN: usize = 16;

/// AES-GCM nonce size in bytes.
const NONCE_LEN: usize = 12;

/// Fill a fixed-size buffer from the OS RNG.
pub(crate) fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

fn cbc_key_error() -> CryptoError {
    CryptoError::InvalidKey(format!("AES-CBC needs a 32-byte key and {IV_LEN}-byte IV"))
}

pub(crate) fn encrypt_cbc(
    key: &[u8],
    iv: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256CbcEnc::new_from_slices(key, iv).map_err(|_| cbc_key_error())?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

pub(crate) fn decrypt_cbc(
    key: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| cbc_key_error())?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Padding)
}

/// Encrypt with AES-256-GCM under a stored key; returns Base64.
pub fn encrypt_gcm(plaintext: &[u8], key: &SymmetricKeyHandle) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.secret())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let nonce_bytes = random_bytes::<NONCE_LEN>();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CryptoError::Aead)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(encode_base64(&out))
}

/// Decrypt Base64 produced by [`encrypt_gcm`].
pub fn decrypt_gcm(encoded: &str, key: &SymmetricKeyHandle) -> Result<Vec<u8>, CryptoError> {
    let data = decode_base64(encoded)?;
    if data.len() < NONCE_LEN {
        return Err(CryptoError::Aead);
    }

    let cipher = Aes256Gcm::new_from_slice(key.secret())
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let (nonce, ciphertext) = data.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Aead)
}
