// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PEM armor handling for RSA public keys.
//!
//! Keys arrive either as full PEM documents or as the bare Base64 body with
//! the header and footer already removed. Both SubjectPublicKeyInfo
//! (`PUBLIC KEY`) and PKCS#1 (`RSA PUBLIC KEY`) encodings are accepted.

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::RsaPublicKey;

use super::{decode_base64, CryptoError};

const SPKI_TAG: &str = "PUBLIC KEY";

/// Remove PEM header/footer lines and all whitespace, leaving the Base64 body.
pub fn strip_armor(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("-----"))
        .flat_map(|line| line.chars().filter(|c| !c.is_whitespace()))
        .collect()
}

/// Parse an RSA public key from PEM or bare Base64 DER.
pub fn parse_public_key(text: &str) -> Result<RsaPublicKey, CryptoError> {
    let der = if text.contains("-----BEGIN") {
        ::pem::parse(text.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("invalid PEM: {e}")))?
            .into_contents()
    } else {
        decode_base64(&strip_armor(text))?
    };

    RsaPublicKey::from_public_key_der(&der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(&der))
        .map_err(|e| CryptoError::InvalidKey(format!("not an RSA public key: {e}")))
}

/// Serialize a public key as SubjectPublicKeyInfo PEM with LF line endings.
pub fn public_key_pem(key: &RsaPublicKey) -> Result<String, CryptoError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    Ok(::pem::encode_config(
        &::pem::Pem::new(SPKI_TAG, der.as_bytes().to_vec()),
        ::pem::EncodeConfig::new().set_line_ending(::pem::LineEnding::LF),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPublicKey;
    use rsa::RsaPrivateKey;

    fn key() -> RsaPublicKey {
        RsaPrivateKey::new(&mut rand::thread_rng(), 1024)
            .unwrap()
            .to_public_key()
    }

    #[test]
    fn pem_round_trip() {
        let key = key();
        let pem = public_key_pem(&key).unwrap();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));
        assert!(!pem.contains('\r'));
        assert_eq!(parse_public_key(&pem).unwrap(), key);
    }

    #[test]
    fn accepts_stripped_body() {
        let key = key();
        let body = strip_armor(&public_key_pem(&key).unwrap());
        assert!(!body.contains('-'));
        assert!(!body.contains('\n'));
        assert_eq!(parse_public_key(&body).unwrap(), key);
    }

    #[test]
    fn accepts_pkcs1_encoding() {
        let key = key();
        let pkcs1 = key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .unwrap();
        assert!(pkcs1.contains("RSA PUBLIC KEY"));
        assert_eq!(parse_public_key(&pkcs1).unwrap(), key);
    }

    #[test]
    fn rejects_non_keys() {
        assert!(matches!(
            parse_public_key("aGVsbG8="),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(matches!(
            parse_public_key("-----BEGIN PUBLIC KEY-----\n!!\n-----END PUBLIC KEY-----"),
            Err(CryptoError::InvalidKey(_))
        ));
    }
}
