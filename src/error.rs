// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Fault Taxonomy
//!
//! Every operation of the authorization channel returns a [`ChannelResult`].
//! The presentation layer decides what to show purely from [`FaultKind`].
//!
//! | Kind | Source | Policy |
//! |------|--------|--------|
//! | `KeyStore` | secure key store unavailable or corrupt | fatal for the connection, never retried silently |
//! | `Crypto` | bad padding, key mismatch, malformed Base64 | recover by re-fetching or re-enrolling |
//! | `Transport` | host unreachable, TLS failure, 5xx | retried on the next scheduled tick |
//! | `Protocol` | entity not found or revoked server-side | terminal for the entity, triggers local cleanup |
//! | `Storage` | connection repository / preference store | surfaced to the caller |

use crate::crypto::CryptoError;
use crate::keys::KeyStoreError;
use crate::storage::StorageError;
use crate::transport::TransportError;

/// Protocol-level failures reported by the backend or detected locally.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("connection {0} not found on the backend")]
    ConnectionNotFound(String),

    #[error("connection {0} was revoked")]
    ConnectionRevoked(String),

    #[error("connection {0} is not active")]
    ConnectionInactive(String),

    #[error("authorization {0} not found")]
    AuthorizationNotFound(String),

    #[error("authorization {0} has expired")]
    AuthorizationExpired(String),

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },

    #[error("backend rejected request with {status} {error_class}: {message}")]
    Rejected {
        status: u16,
        error_class: String,
        message: String,
    },

    #[error("invalid provider configuration: {0}")]
    InvalidConfiguration(String),

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),
}

impl ProtocolError {
    /// Whether the fault invalidates the whole connection.
    pub fn invalidates_connection(&self) -> bool {
        matches!(
            self,
            ProtocolError::ConnectionNotFound(_) | ProtocolError::ConnectionRevoked(_)
        )
    }
}

/// Coarse classification used by callers to pick a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    KeyStore,
    Crypto,
    Transport,
    Protocol,
    Storage,
}

/// Unified error returned by the authorization channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("key store fault: {0}")]
    KeyStore(#[from] KeyStoreError),

    #[error("crypto fault: {0}")]
    Crypto(#[from] CryptoError),

    #[error("transport fault: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol fault: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("storage fault: {0}")]
    Storage(#[from] StorageError),
}

impl ChannelError {
    pub fn fault(&self) -> FaultKind {
        match self {
            ChannelError::KeyStore(_) => FaultKind::KeyStore,
            ChannelError::Crypto(_) => FaultKind::Crypto,
            ChannelError::Transport(_) => FaultKind::Transport,
            ChannelError::Protocol(_) => FaultKind::Protocol,
            ChannelError::Storage(_) => FaultKind::Storage,
        }
    }

    /// Whether the next poll may succeed without user intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self.fault(), FaultKind::Transport | FaultKind::Crypto)
    }

    /// Whether local state for the connection must be cleaned up.
    pub fn requires_cleanup(&self) -> bool {
        matches!(self, ChannelError::Protocol(e) if e.invalidates_connection())
    }
}

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;
