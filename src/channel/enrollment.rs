// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provider discovery and enrollment.

use tracing::{debug, info, warn};
use url::Url;

use crate::crypto::{self, DhPublicKey};
use crate::error::{ChannelResult, ProtocolError};
use crate::keys::{KeyStoreError, PublicKeyHandle};
use crate::models::{
    Connection, EnrollmentData, EnrollmentResult, Envelope, ProviderConfiguration,
};
use crate::transport::HttpMethod;

use super::{endpoint, parse_data, AuthorizationChannel};

/// Result of a successful enrollment request.
#[derive(Debug, Clone)]
pub struct EnrollmentOutcome {
    /// The persisted connection, ACTIVE if the backend issued a token.
    pub connection: Connection,
    /// Where the user must authenticate before the connection is activated.
    pub redirect_url: Option<String>,
}

impl EnrollmentOutcome {
    pub fn is_active(&self) -> bool {
        self.connection.is_active()
    }
}

fn validate_configuration(config: &ProviderConfiguration) -> Result<(), ProtocolError> {
    let url = Url::parse(&config.connect_url).map_err(|e| {
        ProtocolError::InvalidConfiguration(format!("connect_url {:?}: {e}", config.connect_url))
    })?;
    if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
        return Err(ProtocolError::InvalidConfiguration(format!(
            "connect_url {:?} is not an absolute HTTP(S) URL",
            config.connect_url
        )));
    }
    if config.code.trim().is_empty() {
        return Err(ProtocolError::InvalidConfiguration("empty provider code".to_string()));
    }
    DhPublicKey::from_base64(&config.dh_public_key)
        .map_err(|e| ProtocolError::InvalidConfiguration(format!("dh_public_key: {e}")))?;
    Ok(())
}

impl AuthorizationChannel {
    /// Download and validate a provider's configuration. Unsigned.
    pub async fn fetch_provider_configuration(
        &self,
        configuration_url: &str,
    ) -> ChannelResult<ProviderConfiguration> {
        let request = self.unsigned_request(HttpMethod::Get, configuration_url);
        let response = self.send_unsigned(request).await?;
        let config: ProviderConfiguration = parse_data(&response)?;
        validate_configuration(&config)?;
        debug!(provider_code = %config.code, "Fetched provider configuration");
        Ok(config)
    }

    /// Enroll this device with a provider.
    ///
    /// Generates an RSA keypair under a fresh connection guid and sends its
    /// public key to the provider sealed under an X25519 shared secret. On
    /// any failure the new keypair is deleted and nothing is persisted.
    pub async fn enroll(
        &self,
        provider: &ProviderConfiguration,
        push_token: Option<String>,
    ) -> ChannelResult<EnrollmentOutcome> {
        validate_configuration(provider)?;
        let mut connection = Connection::for_provider(provider);
        let guid = connection.guid.clone();

        let keys = self.keys.clone();
        let alias = guid.clone();
        let public_key =
            tokio::task::spawn_blocking(move || keys.create_or_replace_asymmetric_key_pair(&alias))
                .await
                .map_err(|e| KeyStoreError::Generation(format!("key generation task: {e}")))??;

        match self
            .submit_enrollment(&mut connection, &public_key, provider, push_token)
            .await
        {
            Ok(redirect_url) => {
                info!(
                    connection_guid = %guid,
                    provider_code = %provider.code,
                    active = connection.is_active(),
                    "Enrolled connection"
                );
                Ok(EnrollmentOutcome {
                    connection,
                    redirect_url,
                })
            }
            Err(e) => {
                if let Err(delete_err) = self.keys.delete_key(&guid) {
                    warn!(
                        connection_guid = %guid,
                        error = %delete_err,
                        "Failed to delete key after failed enrollment"
                    );
                }
                warn!(connection_guid = %guid, error = %e, "Enrollment failed");
                Err(e)
            }
        }
    }

    async fn submit_enrollment(
        &self,
        connection: &mut Connection,
        public_key: &PublicKeyHandle,
        provider: &ProviderConfiguration,
        push_token: Option<String>,
    ) -> ChannelResult<Option<String>> {
        let provider_key = DhPublicKey::from_base64(&provider.dh_public_key)?;
        let pem = public_key.to_pem()?;
        let bundle = crypto::seal_for_enrollment(pem.as_bytes(), &provider_key)?;

        let body = serde_json::to_string(&Envelope::new(EnrollmentData {
            public_key_bundle: bundle,
            return_url: self.config.return_url.clone(),
            platform: self.config.platform.clone(),
            push_token,
        }))
        .map_err(|e| ProtocolError::MalformedResponse(format!("serialize enrollment: {e}")))?;

        let request = self
            .unsigned_request(HttpMethod::Post, endpoint(&provider.connect_url, "/connections"))
            .body(body);
        let response = self.send_unsigned(request).await?;
        let result: EnrollmentResult = parse_data(&response)?;

        if result.id.trim().is_empty() {
            let reason = "enrollment returned no connection id".to_string();
            return Err(ProtocolError::MalformedResponse(reason).into());
        }
        connection.id = result.id;
        if let Some(connect_url) = result
            .connect_url
            .as_deref()
            .filter(|_| result.access_token.is_none())
        {
            debug!(connection_guid = %connection.guid, "Enrollment needs web authentication");
            self.connections.save(connection)?;
            return Ok(Some(connect_url.to_string()));
        }
        if let Some(token) = result.access_token.as_deref() {
            connection.activate(token)?;
        }
        self.connections.save(connection)?;
        Ok(result.connect_url)
    }

    /// Complete enrollment with the access token delivered after web
    /// authentication (INACTIVE → ACTIVE).
    pub fn activate_connection(&self, guid: &str, access_token: &str) -> ChannelResult<Connection> {
        let rich = self.rich_connection(guid)?;
        let mut connection = rich.connection;
        connection.activate(access_token)?;
        self.connections.save(&connection)?;
        info!(connection_guid = %guid, "Activated connection");
        Ok(connection)
    }
}
