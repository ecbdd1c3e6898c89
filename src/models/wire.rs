// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON payloads exchanged with the authenticator backend.
//!
//! Field names are a frozen wire contract; every request body is wrapped in
//! a `{ "data": ... }` envelope and so is every successful response.

use serde::{Deserialize, Serialize};

/// Envelope used by every request and successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error_class: String,
    #[serde(default)]
    pub error_message: String,
}

/// Hybrid-encrypted payload.
///
/// Never persisted; built per operation. For backend traffic `key` and `iv`
/// carry the RSA-encrypted AES key and IV. For enrollment transport `key`
/// carries the device's ephemeral agreement public key instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBundle {
    #[serde(rename = "data")]
    pub encrypted_data: String,
    #[serde(rename = "key")]
    pub encrypted_key: String,
    #[serde(rename = "iv")]
    pub encrypted_iv: String,
    pub algorithm: String,
}

/// One item of a fetch response: a bundle addressed to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedAuthorization {
    pub id: String,
    pub connection_id: String,
    #[serde(flatten)]
    pub bundle: EncryptedBundle,
}

/// Provider metadata published at the provider's configuration URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfiguration {
    pub connect_url: String,
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Base64 of the provider's X25519 public key
    pub dh_public_key: String,
}

/// `data` of the enrollment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentData {
    pub public_key_bundle: EncryptedBundle,
    pub return_url: String,
    pub platform: String,
    pub push_token: Option<String>,
}

/// `data` of the enrollment response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnrollmentResult {
    pub id: String,
    #[serde(default)]
    pub connect_url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// `data` of the confirm/deny request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionData {
    pub confirm: bool,
    pub authorization_code: String,
}

/// `data` of the confirm/deny and revoke responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub id: Option<String>,
}
