// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Crypto Engine
//!
//! Stateless primitives used by the authorization channel. Every function
//! operates only on the keys and bytes passed to it; key lifecycle lives in
//! [`crate::keys`].
//!
//! ## Payload classes
//!
//! | Payload | Scheme |
//! |---------|--------|
//! | Backend traffic (authorizations) | RSA-PKCS1 wrapped AES-256-CBC ([`hybrid`]) |
//! | Enrollment public key transport | X25519 + HKDF-SHA256 wrapped AES-256-CBC ([`exchange`]) |
//! | On-device passcode | AES-256-GCM ([`symmetric`]) |
//! | Request signatures | SHA-256 with RSA PKCS#1 v1.5 ([`signature`]) |
//!
//! ## Encoding contract
//!
//! All binary values crossing the crate boundary are standard-alphabet Base64
//! strings without line wraps. PEM armor is stripped before parsing and only
//! re-added when a key is serialized for transport.

pub mod armor;
pub mod exchange;
pub mod hybrid;
pub mod signature;
pub mod symmetric;

use base64ct::{Base64, Encoding};

pub use armor::{parse_public_key, public_key_pem, strip_armor};
pub use exchange::{
    derive_shared_secret, open_enrollment_bundle, seal_for_enrollment, DhKeyPair, DhPublicKey,
    ENROLLMENT_ALGORITHM,
};
pub use hybrid::{hybrid_decrypt, hybrid_encrypt, HYBRID_ALGORITHM};
pub use signature::{sign, verify};
pub use symmetric::{decrypt_gcm, encrypt_gcm};

/// Errors raised by the crypto engine.
///
/// All variants are recoverable by re-fetching or re-enrolling; none of them
/// should ever abort a polling loop.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid Base64 input: {0}")]
    InvalidBase64(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("no key stored under alias {0}")]
    MissingKey(String),

    #[error("RSA operation failed: {0}")]
    Rsa(String),

    #[error("AES decryption failed: bad padding or wrong key")]
    Padding,

    #[error("authenticated decryption failed")]
    Aead,

    #[error("unsupported algorithm tag: {0}")]
    UnsupportedAlgorithm(String),

    #[error("key agreement produced a non-contributory secret")]
    WeakSharedSecret,

    #[error("decrypted payload is not valid: {0}")]
    InvalidPayload(String),
}

/// Encode bytes as standard Base64 with no line wraps.
pub fn encode_base64(bytes: &[u8]) -> String {
    Base64::encode_string(bytes)
}

/// Decode a standard Base64 string, tolerating embedded whitespace.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, CryptoError> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    Base64::decode_vec(&compact).map_err(|e| CryptoError::InvalidBase64(e.to_string()))
}
