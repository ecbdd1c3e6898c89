// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization Channel
//!
//! Glue between the key manager, the crypto engine, the request signer and
//! the HTTP transport. Every public operation returns a [`ChannelResult`];
//! nothing panics or escapes untyped, so a failing connection never stops
//! polling for the others.
//!
//! ## Endpoints
//!
//! All paths are relative to the provider's `connect_url`:
//!
//! | Operation | Request | Signed |
//! |-----------|---------|--------|
//! | Enroll | `POST /api/authenticator/v1/connections` | no |
//! | List authorizations | `GET /api/authenticator/v1/authorizations` | yes |
//! | Show authorization | `GET /api/authenticator/v1/authorizations/{id}` | yes |
//! | Confirm / deny | `PUT /api/authenticator/v1/authorizations/{id}` | yes |
//! | Revoke | `DELETE /api/authenticator/v1/connections` | yes |
//!
//! ## Error classes
//!
//! A 404 or one of the connection-level error classes
//! (`ConnectionNotFound`, `ConnectionRevoked`, `AccessTokenRevoked`,
//! `InvalidAccessToken`) means the backend no longer knows the connection:
//! its key is deleted and the record is marked REVOKED.

mod authorizations;
mod enrollment;
mod revoke;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::config::ChannelConfig;
use crate::crypto::CryptoError;
use crate::error::{ChannelError, ChannelResult, ProtocolError};
use crate::keys::{KeyManager, PrivateKeyHandle};
use crate::models::{Connection, Envelope, ErrorBody};
use crate::signing::RequestSigner;
use crate::storage::ConnectionRepository;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

pub use authorizations::{ConnectionAuthorizations, FetchedAuthorization};
pub use enrollment::EnrollmentOutcome;

pub const API_PREFIX: &str = "/api/authenticator/v1";

pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const ACCEPT_LANGUAGE_HEADER: &str = "Accept-Language";
pub const ACCESS_TOKEN_HEADER: &str = "Access-Token";
pub const EXPIRES_AT_HEADER: &str = "Expires-at";
pub const SIGNATURE_HEADER: &str = "Signature";

const JSON_CONTENT_TYPE: &str = "application/json";

const CONNECTION_LEVEL_CLASSES: [&str; 3] =
    ["ConnectionRevoked", "AccessTokenRevoked", "InvalidAccessToken"];

/// A connection paired with its private key for the duration of one
/// operation. Never persisted or logged.
pub struct RichConnection {
    pub connection: Connection,
    pub private_key: PrivateKeyHandle,
}

impl std::fmt::Debug for RichConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RichConnection")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

/// Builds, signs and sends requests on behalf of enrolled connections.
///
/// All collaborators are injected; the channel is cheap to clone and can be
/// shared between polling contracts.
#[derive(Clone)]
pub struct AuthorizationChannel {
    transport: Arc<dyn HttpTransport>,
    keys: KeyManager,
    connections: Arc<dyn ConnectionRepository>,
    signer: RequestSigner,
    config: ChannelConfig,
}

impl AuthorizationChannel {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        keys: KeyManager,
        connections: Arc<dyn ConnectionRepository>,
        config: ChannelConfig,
    ) -> Self {
        Self {
            transport,
            keys,
            connections,
            signer: RequestSigner::new(config.signature_ttl_chrono()),
            config,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    pub fn connections(&self) -> &Arc<dyn ConnectionRepository> {
        &self.connections
    }

    /// Load a connection and its private key.
    ///
    /// A missing record is a connection-level protocol fault; a missing key
    /// is a crypto fault (recover by re-enrolling).
    pub fn rich_connection(&self, guid: &str) -> ChannelResult<RichConnection> {
        let connection = self
            .connections
            .get_by_guid(guid)?
            .ok_or_else(|| ProtocolError::ConnectionNotFound(guid.to_string()))?;
        let private_key = self
            .keys
            .get_private_key_handle(guid)?
            .ok_or_else(|| CryptoError::MissingKey(guid.to_string()))?;
        Ok(RichConnection {
            connection,
            private_key,
        })
    }

    fn active_rich_connection(&self, guid: &str) -> ChannelResult<RichConnection> {
        let rich = self.rich_connection(guid)?;
        if !rich.connection.is_active() {
            return Err(ProtocolError::ConnectionInactive(guid.to_string()).into());
        }
        Ok(rich)
    }

    fn unsigned_request(&self, method: HttpMethod, url: impl Into<String>) -> HttpRequest {
        HttpRequest::new(method, url)
            .header(CONTENT_TYPE_HEADER, JSON_CONTENT_TYPE)
            .header(ACCEPT_LANGUAGE_HEADER, self.config.accept_language.clone())
    }

    fn signed_request(
        &self,
        rich: &RichConnection,
        method: HttpMethod,
        url: String,
        body: Option<String>,
    ) -> ChannelResult<HttpRequest> {
        let signed = self.signer.sign_request(
            method.as_str(),
            &url,
            body.as_deref().unwrap_or_default(),
            &rich.private_key,
        )?;

        let mut request = self
            .unsigned_request(method, url)
            .header(EXPIRES_AT_HEADER, signed.expires_at.to_string())
            .header(SIGNATURE_HEADER, signed.signature);
        if rich.connection.is_active() {
            request = request.header(ACCESS_TOKEN_HEADER, rich.connection.access_token.clone());
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        Ok(request)
    }

    /// Send a signed request and classify any failure for `guid`.
    async fn send_signed(
        &self,
        rich: &RichConnection,
        method: HttpMethod,
        url: String,
        body: Option<String>,
        authorization_id: Option<&str>,
    ) -> ChannelResult<HttpResponse> {
        let request = self.signed_request(rich, method, url, body)?;
        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(classify_failure(&response, &rich.connection.guid, authorization_id))
        }
    }

    async fn send_unsigned(&self, request: HttpRequest) -> ChannelResult<HttpResponse> {
        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(classify_unsigned_failure(&response))
        }
    }

    /// Local cleanup for a connection the backend no longer recognises:
    /// delete its key and mark the record REVOKED.
    fn invalidate_connection(&self, guid: &str) {
        if let Err(e) = self.keys.delete_key(guid) {
            warn!(
                connection_guid = %guid,
                error = %e,
                "Failed to delete key of invalidated connection"
            );
        }
        match self.connections.get_by_guid(guid) {
            Ok(Some(mut connection)) => {
                connection.revoke();
                if let Err(e) = self.connections.save(&connection) {
                    warn!(
                        connection_guid = %guid,
                        error = %e,
                        "Failed to persist revoked connection"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(connection_guid = %guid, error = %e, "Failed to load invalidated connection");
            }
        }
        info!(connection_guid = %guid, "Connection invalidated by backend");
    }

    /// Apply the cleanup policy for `error` and hand it back.
    fn after_failure(&self, guid: &str, error: ChannelError) -> ChannelError {
        if error.requires_cleanup() {
            self.invalidate_connection(guid);
        } else {
            warn!(
                connection_guid = %guid,
                fault = ?error.fault(),
                error = %error,
                "Channel operation failed"
            );
        }
        error
    }
}

/// `{connect_url}/api/authenticator/v1{path}`.
pub(crate) fn endpoint(connect_url: &str, path: &str) -> String {
    format!("{}{API_PREFIX}{path}", connect_url.trim_end_matches('/'))
}

pub(crate) fn parse_data<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ProtocolError> {
    serde_json::from_str::<Envelope<T>>(&response.body)
        .map(|envelope| envelope.data)
        .map_err(|e| ProtocolError::MalformedResponse(e.to_string()))
}

fn error_body(response: &HttpResponse) -> ErrorBody {
    serde_json::from_str(&response.body).unwrap_or_default()
}

/// Map a non-2xx response on a connection's behalf to a typed fault.
pub(crate) fn classify_failure(
    response: &HttpResponse,
    guid: &str,
    authorization_id: Option<&str>,
) -> ChannelError {
    let body = error_body(response);
    let class = body.error_class.as_str();

    if class == "ConnectionNotFound" {
        return ProtocolError::ConnectionNotFound(guid.to_string()).into();
    }
    if CONNECTION_LEVEL_CLASSES.contains(&class) {
        return ProtocolError::ConnectionRevoked(guid.to_string()).into();
    }
    if class == "AuthorizationNotFound" {
        let id = authorization_id.unwrap_or_default().to_string();
        return ProtocolError::AuthorizationNotFound(id).into();
    }
    if response.status >= 500 {
        return TransportError::Server {
            status: response.status,
            message: body.error_message,
        }
        .into();
    }
    // An unclassified 404 only condemns what the request addressed.
    if response.status == 404 && class.is_empty() {
        return match authorization_id {
            Some(id) => ProtocolError::AuthorizationNotFound(id.to_string()).into(),
            None => ProtocolError::ConnectionNotFound(guid.to_string()).into(),
        };
    }
    ProtocolError::Rejected {
        status: response.status,
        error_class: body.error_class,
        message: body.error_message,
    }
    .into()
}

/// Failures of requests made before a connection exists.
fn classify_unsigned_failure(response: &HttpResponse) -> ChannelError {
    let body = error_body(response);
    if response.status >= 500 {
        return TransportError::Server {
            status: response.status,
            message: body.error_message,
        }
        .into();
    }
    ProtocolError::Rejected {
        status: response.status,
        error_class: body.error_class,
        message: body.error_message,
    }
    .into()
}
