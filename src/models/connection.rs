// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Connection records and their lifecycle (INACTIVE → ACTIVE → REVOKED).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolError;

use super::wire::ProviderConfiguration;

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Enrollment submitted, backend has not issued an access token yet
    #[default]
    Inactive,
    /// Enrolled and holding an access token
    Active,
    /// Revoked locally or server-side; terminal
    Revoked,
}

/// One enrolled banking relationship.
///
/// `guid` is generated on the device and doubles as the alias of the
/// connection's RSA keypair. `id` is assigned by the backend.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    pub guid: String,
    pub id: String,
    pub code: String,
    pub name: String,
    pub access_token: String,
    pub status: ConnectionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub support_email: String,
    pub logo_url: String,
    pub connect_url: String,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("guid", &self.guid)
            .field("id", &self.id)
            .field("code", &self.code)
            .field("status", &self.status)
            .field("access_token", &"[REDACTED]")
            .field("connect_url", &self.connect_url)
            .finish()
    }
}

impl Connection {
    /// Create an INACTIVE connection for a provider with a fresh guid.
    pub fn for_provider(provider: &ProviderConfiguration) -> Self {
        let now = Utc::now();
        Self {
            guid: Uuid::new_v4().to_string(),
            id: String::new(),
            code: provider.code.clone(),
            name: provider.name.clone(),
            access_token: String::new(),
            status: ConnectionStatus::Inactive,
            created_at: now,
            updated_at: now,
            support_email: provider.support_email.clone().unwrap_or_default(),
            logo_url: provider.logo_url.clone().unwrap_or_default(),
            connect_url: provider.connect_url.clone(),
        }
    }

    /// ACTIVE iff the status says so and an access token is held.
    pub fn is_active(&self) -> bool {
        self.status == ConnectionStatus::Active && !self.access_token.is_empty()
    }

    /// Store the access token issued by the backend and move to ACTIVE.
    ///
    /// Re-activating an ACTIVE connection replaces its token.
    pub fn activate(&mut self, access_token: &str) -> Result<(), ProtocolError> {
        if self.status == ConnectionStatus::Revoked {
            return Err(ProtocolError::InvalidTransition {
                entity: "connection",
                from: "revoked",
                to: "active",
            });
        }
        if access_token.trim().is_empty() {
            return Err(ProtocolError::MalformedResponse(
                "empty access token".to_string(),
            ));
        }
        self.access_token = access_token.to_string();
        self.status = ConnectionStatus::Active;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Move to REVOKED and drop the access token. Idempotent.
    pub fn revoke(&mut self) {
        self.access_token.clear();
        self.status = ConnectionStatus::Revoked;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderConfiguration {
        ProviderConfiguration {
            connect_url: "https://bank.example.com".to_string(),
            code: "demobank".to_string(),
            name: "Demo Bank".to_string(),
            logo_url: Some("https://bank.example.com/logo.png".to_string()),
            support_email: Some("support@bank.example.com".to_string()),
            version: Some("1".to_string()),
            dh_public_key: "AAAA".to_string(),
        }
    }

    #[test]
    fn new_connection_is_inactive() {
        let connection = Connection::for_provider(&provider());
        assert_eq!(connection.status, ConnectionStatus::Inactive);
        assert!(!connection.is_active());
        assert!(Uuid::parse_str(&connection.guid).is_ok());
        assert_eq!(connection.support_email, "support@bank.example.com");
    }

    #[test]
    fn guids_are_unique() {
        let a = Connection::for_provider(&provider());
        let b = Connection::for_provider(&provider());
        assert_ne!(a.guid, b.guid);
    }

    #[test]
    fn activation_requires_token() {
        let mut connection = Connection::for_provider(&provider());
        assert!(connection.activate("  ").is_err());
        assert!(!connection.is_active());

        connection.activate("token-1").unwrap();
        assert!(connection.is_active());
    }

    #[test]
    fn active_status_without_token_is_not_active() {
        let mut connection = Connection::for_provider(&provider());
        connection.status = ConnectionStatus::Active;
        assert!(!connection.is_active());
    }

    #[test]
    fn revoked_connection_cannot_be_reactivated() {
        let mut connection = Connection::for_provider(&provider());
        connection.activate("token-1").unwrap();
        connection.revoke();

        assert_eq!(connection.status, ConnectionStatus::Revoked);
        assert!(connection.access_token.is_empty());
        assert!(matches!(
            connection.activate("token-2"),
            Err(ProtocolError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn debug_output_hides_access_token() {
        let mut connection = Connection::for_provider(&provider());
        connection.activate("very-secret-token").unwrap();
        let printed = format!("{connection:?}");
        assert!(!printed.contains("very-secret-token"));
    }
}
