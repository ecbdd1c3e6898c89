// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SHA-256 with RSA (PKCS#1 v1.5) signatures.
//!
//! PKCS#1 v1.5 signing is deterministic: the same key and message always
//! produce the same signature bytes.

use rsa::Pkcs1v15Sign;
use sha2::{Digest, Sha256};

use crate::keys::{PrivateKeyHandle, PublicKeyHandle};

use super::CryptoError;

pub fn sign(message: &[u8], key: &PrivateKeyHandle) -> Result<Vec<u8>, CryptoError> {
    let digest = Sha256::digest(message);
    key.rsa()
        .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
        .map_err(|e| CryptoError::Rsa(e.to_string()))
}

pub fn verify(message: &[u8], signature: &[u8], key: &PublicKeyHandle) -> bool {
    let digest = Sha256::digest(message);
    key.rsa()
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{InMemoryKeyStore, KeyManager};
    use std::sync::Arc;

    fn keys() -> (PublicKeyHandle, PrivateKeyHandle) {
        let manager = KeyManager::new(Arc::new(InMemoryKeyStore::new()));
        let public = manager.create_or_replace_asymmetric_key_pair("signer").unwrap();
        let private = manager.get_private_key_handle("signer").unwrap().unwrap();
        (public, private)
    }

    #[test]
    fn signature_verifies_and_rejects_single_bit_flips() {
        let (public, private) = keys();
        let message = b"post|https://x/y|1700000000|{}".to_vec();
        let signature = sign(&message, &private).unwrap();
        assert!(verify(&message, &signature, &public));

        for bit in [0usize, 7, 100, message.len() * 8 - 1] {
            let mut mutated = message.clone();
            mutated[bit / 8] ^= 1 << (bit % 8);
            assert!(!verify(&mutated, &signature, &public), "message bit {bit}");
        }

        for bit in [0usize, 1000, signature.len() * 8 - 1] {
            let mut mutated = signature.clone();
            mutated[bit / 8] ^= 1 << (bit % 8);
            assert!(!verify(&message, &mutated, &public), "signature bit {bit}");
        }
    }

    #[test]
    fn signing_is_deterministic() {
        let (_, private) = keys();
        assert_eq!(
            sign(b"payload", &private).unwrap(),
            sign(b"payload", &private).unwrap()
        );
    }

    #[test]
    fn other_key_does_not_verify() {
        let (_, private) = keys();
        let (other_public, _) = keys();
        let signature = sign(b"payload", &private).unwrap();
        assert!(!verify(b"payload", &signature, &other_public));
    }
}
