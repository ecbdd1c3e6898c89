// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request signing
//!
//! Every authenticated request carries two headers:
//!
//! | Header | Value |
//! |--------|-------|
//! | `Expires-at` | expiry as Unix epoch seconds |
//! | `Signature` | Base64 SHA-256-with-RSA signature over the canonical string |
//!
//! The canonical string is `lower(method)|url|expires_at|body`. The backend
//! rebuilds the same bytes to verify, so the format must never change.

use chrono::{DateTime, Duration, Utc};

use crate::crypto::{self, CryptoError};
use crate::keys::PrivateKeyHandle;

/// Delimiter between canonical string fields.
pub const CANONICAL_DELIMITER: char = '|';

/// Default signature lifetime in seconds (5 minutes).
pub const DEFAULT_SIGNATURE_TTL_SECS: i64 = 300;

/// Signature and expiry ready to be attached as headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub signature: String,
    pub expires_at: i64,
}

/// Build the exact byte sequence that gets signed.
pub fn build_canonical_string(method: &str, url: &str, expires_at: i64, body: &str) -> String {
    let d = CANONICAL_DELIMITER;
    format!("{}{d}{url}{d}{expires_at}{d}{body}", method.to_lowercase())
}

#[derive(Debug, Clone, Copy)]
pub struct RequestSigner {
    ttl: Duration,
}

impl Default for RequestSigner {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SIGNATURE_TTL_SECS))
    }
}

impl RequestSigner {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a request expiring `ttl` from now.
    pub fn sign_request(
        &self,
        method: &str,
        url: &str,
        body: &str,
        key: &PrivateKeyHandle,
    ) -> Result<SignedHeaders, CryptoError> {
        self.sign_request_at(method, url, body, key, Utc::now())
    }

    pub fn sign_request_at(
        &self,
        method: &str,
        url: &str,
        body: &str,
        key: &PrivateKeyHandle,
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders, CryptoError> {
        let expires_at = (now + self.ttl).timestamp();
        self.sign_with_expiry(method, url, expires_at, body, key)
    }

    /// Sign with an explicit expiry.
    pub fn sign_with_expiry(
        &self,
        method: &str,
        url: &str,
        expires_at: i64,
        body: &str,
        key: &PrivateKeyHandle,
    ) -> Result<SignedHeaders, CryptoError> {
        let canonical = build_canonical_string(method, url, expires_at, body);
        let signature = crypto::sign(canonical.as_bytes(), key)?;
        Ok(SignedHeaders {
            signature: crypto::encode_base64(&signature),
            expires_at,
        })
    }
}
