// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fetching, decrypting and resolving authorizations.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::crypto::{self, CryptoError};
use crate::error::{ChannelError, ChannelResult, ProtocolError};
use crate::keys::PrivateKeyHandle;
use crate::models::{
    ActionResult, Authorization, Decision, DecisionData, EncryptedAuthorization, Envelope,
};
use crate::transport::HttpMethod;

use super::{endpoint, parse_data, AuthorizationChannel};

/// One item of a fetch: either a decrypted authorization (PENDING, or
/// EXPIRED if its deadline passed) or the fault that prevented decryption.
#[derive(Debug)]
pub enum FetchedAuthorization {
    Ready(Authorization),
    Failed { id: String, error: ChannelError },
}

impl FetchedAuthorization {
    pub fn id(&self) -> &str {
        match self {
            FetchedAuthorization::Ready(authorization) => &authorization.id,
            FetchedAuthorization::Failed { id, .. } => id,
        }
    }

    pub fn authorization(&self) -> Option<&Authorization> {
        match self {
            FetchedAuthorization::Ready(authorization) => Some(authorization),
            FetchedAuthorization::Failed { .. } => None,
        }
    }
}

/// Fetch result for one connection.
#[derive(Debug)]
pub struct ConnectionAuthorizations {
    pub connection_guid: String,
    pub result: ChannelResult<Vec<FetchedAuthorization>>,
}

/// Decrypt one fetched item and check it belongs where the envelope says.
fn decrypt_with(
    key: &PrivateKeyHandle,
    item: &EncryptedAuthorization,
    now: DateTime<Utc>,
) -> Result<Authorization, CryptoError> {
    let plaintext = crypto::hybrid_decrypt(&item.bundle, key)?;
    let mut authorization: Authorization = serde_json::from_slice(&plaintext)
        .map_err(|e| CryptoError::InvalidPayload(e.to_string()))?;

    if authorization.id != item.id || authorization.connection_id != item.connection_id {
        return Err(CryptoError::InvalidPayload(format!(
            "envelope {}/{} does not match payload {}/{}",
            item.connection_id, item.id, authorization.connection_id, authorization.id
        )));
    }
    authorization.expire_if_due(now);
    Ok(authorization)
}

impl AuthorizationChannel {
    /// Fetch pending authorizations for several connections concurrently.
    ///
    /// Results come back in the order of `guids`; one connection failing
    /// does not affect the others.
    pub async fn fetch_authorizations(&self, guids: &[String]) -> Vec<ConnectionAuthorizations> {
        join_all(guids.iter().map(|guid| async move {
            ConnectionAuthorizations {
                connection_guid: guid.clone(),
                result: self.fetch_connection_authorizations(guid).await,
            }
        }))
        .await
    }

    /// Fetch and decrypt all pending authorizations of one connection.
    pub async fn fetch_connection_authorizations(
        &self,
        guid: &str,
    ) -> ChannelResult<Vec<FetchedAuthorization>> {
        let result = self.try_fetch_connection_authorizations(guid).await;
        result.map_err(|e| self.after_failure(guid, e))
    }

    async fn try_fetch_connection_authorizations(
        &self,
        guid: &str,
    ) -> ChannelResult<Vec<FetchedAuthorization>> {
        let rich = self.active_rich_connection(guid)?;
        let url = endpoint(&rich.connection.connect_url, "/authorizations");
        let response = self.send_signed(&rich, HttpMethod::Get, url, None, None).await?;
        let items: Vec<EncryptedAuthorization> = parse_data(&response)?;

        let now = Utc::now();
        let fetched: Vec<FetchedAuthorization> = items
            .iter()
            .map(|item| match decrypt_with(&rich.private_key, item, now) {
                Ok(authorization) => FetchedAuthorization::Ready(authorization),
                Err(e) => {
                    warn!(
                        connection_guid = %guid,
                        authorization_id = %item.id,
                        error = %e,
                        "Failed to decrypt authorization"
                    );
                    FetchedAuthorization::Failed {
                        id: item.id.clone(),
                        error: e.into(),
                    }
                }
            })
            .collect();

        debug!(connection_guid = %guid, count = fetched.len(), "Fetched authorizations");
        Ok(fetched)
    }

    /// Fetch a single authorization by id.
    pub async fn fetch_authorization(
        &self,
        guid: &str,
        authorization_id: &str,
    ) -> ChannelResult<Authorization> {
        let result = self.try_fetch_authorization(guid, authorization_id).await;
        result.map_err(|e| self.after_failure(guid, e))
    }

    async fn try_fetch_authorization(
        &self,
        guid: &str,
        authorization_id: &str,
    ) -> ChannelResult<Authorization> {
        let rich = self.active_rich_connection(guid)?;
        let url = endpoint(
            &rich.connection.connect_url,
            &format!("/authorizations/{authorization_id}"),
        );
        let response = self
            .send_signed(&rich, HttpMethod::Get, url, None, Some(authorization_id))
            .await?;
        let item: EncryptedAuthorization = parse_data(&response)?;
        Ok(decrypt_with(&rich.private_key, &item, Utc::now())?)
    }

    /// Decrypt an item with the key stored under `guid`.
    ///
    /// Fails with a crypto fault once that key has been deleted.
    pub fn decrypt_authorization(
        &self,
        guid: &str,
        item: &EncryptedAuthorization,
    ) -> ChannelResult<Authorization> {
        let key = self
            .keys
            .get_private_key_handle(guid)?
            .ok_or_else(|| CryptoError::MissingKey(guid.to_string()))?;
        Ok(decrypt_with(&key, item, Utc::now())?)
    }

    pub async fn confirm_authorization(
        &self,
        guid: &str,
        authorization: &mut Authorization,
    ) -> ChannelResult<()> {
        self.resolve_authorization(guid, authorization, Decision::Confirm)
            .await
    }

    pub async fn deny_authorization(
        &self,
        guid: &str,
        authorization: &mut Authorization,
    ) -> ChannelResult<()> {
        self.resolve_authorization(guid, authorization, Decision::Deny)
            .await
    }

    /// Send the user's decision.
    ///
    /// An expired authorization is marked EXPIRED and rejected without a
    /// network call. On any failure the authorization stays PENDING.
    pub async fn resolve_authorization(
        &self,
        guid: &str,
        authorization: &mut Authorization,
        decision: Decision,
    ) -> ChannelResult<()> {
        authorization.ensure_decidable(Utc::now())?;

        let sent = self.send_decision(guid, authorization, decision).await;
        match sent {
            Ok(()) => {
                authorization.apply_decision(decision)?;
                info!(
                    connection_guid = %guid,
                    authorization_id = %authorization.id,
                    ?decision,
                    "Authorization resolved"
                );
                Ok(())
            }
            Err(e) => Err(self.after_failure(guid, e)),
        }
    }

    async fn send_decision(
        &self,
        guid: &str,
        authorization: &Authorization,
        decision: Decision,
    ) -> ChannelResult<()> {
        let rich = self.active_rich_connection(guid)?;
        let body = serde_json::to_string(&Envelope::new(DecisionData {
            confirm: decision.as_confirm_flag(),
            authorization_code: authorization.authorization_code.clone(),
        }))
        .map_err(|e| ProtocolError::MalformedResponse(format!("serialize decision: {e}")))?;

        let url = endpoint(
            &rich.connection.connect_url,
            &format!("/authorizations/{}", authorization.id),
        );
        let response = self
            .send_signed(&rich, HttpMethod::Put, url, Some(body), Some(&authorization.id))
            .await?;
        let action: ActionResult = parse_data(&response)?;
        if !action.success {
            return Err(ProtocolError::Rejected {
                status: response.status,
                error_class: String::new(),
                message: format!("decision on {} was not accepted", authorization.id),
            }
            .into());
        }
        Ok(())
    }
}
