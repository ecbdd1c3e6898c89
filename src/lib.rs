// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Authenticator - Device-bound second factor core
//!
//! Enrolls a device-held RSA keypair with a banking backend, signs every
//! subsequent request with it, decrypts the pending authorizations the
//! backend encrypts for it, and sends back the user's decisions.
//!
//! ## Modules
//!
//! - `keys` - Key lifecycle over a platform secure store
//! - `crypto` - Hybrid encryption, enrollment key exchange, signatures
//! - `signing` - Canonical request signing
//! - `channel` - Enrollment, authorization fetch/confirm/deny, revocation
//! - `polling` - Lifecycle-bound periodic fetch
//! - `models` - Connection and authorization state machines, wire types
//! - `storage` - Connection records and preference flags
//! - `passcode` - On-device passcode and biometric unlock
//! - `transport` - HTTP collaborator (`reqwest` in production)
//!
//! ## Wiring
//!
//! ```ignore
//! let config = ChannelConfig::from_env();
//! let storage = LocalStorage::open(StoragePaths::new(&config.data_dir))?;
//! let channel = AuthorizationChannel::new(
//!     Arc::new(ReqwestTransport::new(config.http_timeout)?),
//!     KeyManager::new(Arc::new(FileKeyStore::new(storage.clone()))),
//!     Arc::new(FileConnectionRepository::new(storage)),
//!     config,
//! );
//! let scheduler = AuthorizationsPoller::new(channel, screen)
//!     .into_scheduler(runtime.handle().clone());
//! scheduler.start();
//! ```

pub mod channel;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod logging;
pub mod models;
pub mod passcode;
pub mod polling;
pub mod signing;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod testing;

pub use channel::{AuthorizationChannel, ConnectionAuthorizations, FetchedAuthorization};
pub use config::ChannelConfig;
pub use error::{ChannelError, ChannelResult, FaultKind};
pub use keys::KeyManager;
pub use polling::PollingScheduler;
