// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Revocation and local connection management.

use futures::future::join_all;
use tracing::info;

use crate::error::{ChannelResult, ProtocolError};
use crate::transport::HttpMethod;

use super::{endpoint, AuthorizationChannel};

impl AuthorizationChannel {
    /// Revoke a connection on the backend, then locally.
    ///
    /// The backend answering "not found" or "already revoked" counts as
    /// success. Any other failure leaves local state untouched so the
    /// revocation can be retried. Connections without an access token or a
    /// key are only revoked locally.
    pub async fn revoke_connection(&self, guid: &str) -> ChannelResult<()> {
        let Some(connection) = self.connections.get_by_guid(guid)? else {
            self.keys.delete_key(guid)?;
            return Err(ProtocolError::ConnectionNotFound(guid.to_string()).into());
        };

        if connection.is_active() && self.keys.key_exists(guid)? {
            let rich = self.rich_connection(guid)?;
            let url = endpoint(&rich.connection.connect_url, "/connections");
            match self.send_signed(&rich, HttpMethod::Delete, url, None, None).await {
                Ok(_) => {}
                Err(e) if e.requires_cleanup() => {
                    info!(connection_guid = %guid, "Connection already gone on the backend");
                }
                Err(e) => return Err(e),
            }
        }

        self.keys.delete_key(guid)?;
        let mut revoked = connection;
        revoked.revoke();
        self.connections.save(&revoked)?;
        info!(connection_guid = %guid, "Revoked connection");
        Ok(())
    }

    /// Revoke several connections concurrently, reporting each outcome.
    pub async fn revoke_connections(&self, guids: &[String]) -> Vec<(String, ChannelResult<()>)> {
        join_all(
            guids
                .iter()
                .map(|guid| async move { (guid.clone(), self.revoke_connection(guid).await) }),
        )
        .await
    }

    /// Remove a connection record and its key without contacting the backend.
    ///
    /// Returns whether a record existed.
    pub fn delete_connection(&self, guid: &str) -> ChannelResult<bool> {
        self.keys.delete_key(guid)?;
        let existed = self.connections.delete(guid)?;
        info!(connection_guid = %guid, existed, "Deleted connection locally");
        Ok(existed)
    }

    /// Delete keypairs left behind by connections that have no record, e.g.
    /// after an interrupted enrollment. Returns the removed aliases.
    pub fn remove_orphaned_keys(&self) -> ChannelResult<Vec<String>> {
        let known: Vec<String> = self
            .connections
            .all()?
            .into_iter()
            .map(|connection| connection.guid)
            .collect();
        Ok(self.keys.delete_orphaned_key_pairs(&known)?)
    }

    pub fn has_active_connections(&self) -> ChannelResult<bool> {
        Ok(self.connections.has_active_connections()?)
    }

    /// Guids of ACTIVE connections, oldest first.
    pub fn active_connection_guids(&self) -> ChannelResult<Vec<String>> {
        Ok(self
            .connections
            .active()?
            .into_iter()
            .map(|connection| connection.guid)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{ChannelError, FaultKind, ProtocolError};
    use crate::models::ConnectionStatus;
    use crate::testing::channel_with_bank;
    use crate::transport::{HttpMethod, TransportError};

    #[tokio::test]
    async fn revoke_deletes_key_and_marks_revoked() {
        let (bank, channel) = channel_with_bank();
        let outcome = channel.enroll(&bank.configuration(), None).await.unwrap();
        let guid = outcome.connection.guid;

        channel.revoke_connection(&guid).await.unwrap();

        assert_eq!(bank.request_count(HttpMethod::Delete), 1);
        assert!(bank.device_public_key_pem(&outcome.connection.id).is_none());
        assert!(!channel.keys().key_exists(&guid).unwrap());
        let stored = channel.connections().get_by_guid(&guid).unwrap().unwrap();
        assert_eq!(stored.status, ConnectionStatus::Revoked);
        assert!(!channel.has_active_connections().unwrap());
    }

    #[tokio::test]
    async fn revoke_tolerates_backend_not_found() {
        let (bank, channel) = channel_with_bank();
        let outcome = channel.enroll(&bank.configuration(), None).await.unwrap();
        bank.script_error(404, "ConnectionNotFound");

        channel.revoke_connection(&outcome.connection.guid).await.unwrap();
        assert!(!channel.keys().key_exists(&outcome.connection.guid).unwrap());
    }

    #[tokio::test]
    async fn transport_failure_keeps_connection_for_retry() {
        let (bank, channel) = channel_with_bank();
        let outcome = channel.enroll(&bank.configuration(), None).await.unwrap();
        let guid = outcome.connection.guid;
        bank.script(Err(TransportError::Timeout("slow".to_string())));

        let err = channel.revoke_connection(&guid).await.unwrap_err();
        assert_eq!(err.fault(), FaultKind::Transport);
        assert!(channel.keys().key_exists(&guid).unwrap());
        assert!(channel.has_active_connections().unwrap());

        channel.revoke_connection(&guid).await.unwrap();
        assert!(!channel.has_active_connections().unwrap());
    }

    #[tokio::test]
    async fn inactive_connection_is_revoked_locally() {
        let (bank, channel) = channel_with_bank();
        bank.withhold_tokens();
        let outcome = channel.enroll(&bank.configuration(), None).await.unwrap();

        channel.revoke_connection(&outcome.connection.guid).await.unwrap();
        assert_eq!(bank.request_count(HttpMethod::Delete), 0);
        assert!(!channel.keys().key_exists(&outcome.connection.guid).unwrap());
    }

    #[tokio::test]
    async fn revoking_unknown_connection_is_a_protocol_fault() {
        let (_bank, channel) = channel_with_bank();
        let err = channel.revoke_connection("missing").await.unwrap_err();
        assert!(matches!(err, ChannelError::Protocol(ProtocolError::ConnectionNotFound(_))));
    }

    #[tokio::test]
    async fn revoke_many_reports_each() {
        let (bank, channel) = channel_with_bank();
        let first = channel.enroll(&bank.configuration(), None).await.unwrap();
        let second = channel.enroll(&bank.configuration(), None).await.unwrap();
        assert_eq!(channel.active_connection_guids().unwrap().len(), 2);

        let guids = vec![first.connection.guid.clone(), second.connection.guid.clone()];
        let results = channel.revoke_connections(&guids).await;
        assert!(results.iter().all(|(_, result)| result.is_ok()));
        assert!(channel.active_connection_guids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_connection_is_local_only() {
        let (bank, channel) = channel_with_bank();
        let outcome = channel.enroll(&bank.configuration(), None).await.unwrap();
        let guid = outcome.connection.guid;
        let requests_before = bank.requests().len();

        assert!(channel.delete_connection(&guid).unwrap());
        assert!(!channel.delete_connection(&guid).unwrap());
        assert_eq!(bank.requests().len(), requests_before);
        assert!(channel.connections().get_by_guid(&guid).unwrap().is_none());
        assert!(!channel.keys().key_exists(&guid).unwrap());
    }

    #[tokio::test]
    async fn orphaned_keys_are_removed_but_app_keys_stay() {
        let (bank, channel) = channel_with_bank();
        let outcome = channel.enroll(&bank.configuration(), None).await.unwrap();
        let keys = channel.keys();
        keys.create_or_replace_asymmetric_key_pair("stale-guid").unwrap();
        keys.create_or_replace_symmetric_key("passcode_secure_key", false).unwrap();

        let removed = channel.remove_orphaned_keys().unwrap();
        assert_eq!(removed, vec!["stale-guid".to_string()]);
        assert!(keys.key_exists(&outcome.connection.guid).unwrap());
        assert!(keys.key_exists("passcode_secure_key").unwrap());
    }
}
