// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Local Storage Module
//!
//! Persistence for everything the authenticator keeps on the device. All data
//! lives under a single root directory, the application's private data
//! directory on mobile shells.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//!   connections/
//!     {guid}.json          # Connection record (no key material)
//!   keys/{alias}/
//!     private.pem          # RSA private key (PKCS#8), see crate::keys
//!     secret.json          # AES-256 key record
//!   preferences.json       # Flags such as biometric_enabled
//! ```
//!
//! ## Important Notes
//!
//! - Confidentiality at rest is provided by the platform sandbox
//! - Key files are written owner-readable only
//! - Guids and aliases are validated before becoming path components

pub mod connections;
pub mod fs;
pub mod paths;
pub mod preferences;

pub use connections::{ConnectionRepository, FileConnectionRepository, InMemoryConnectionRepository};
pub use fs::{LocalStorage, StorageError, StorageResult};
pub use paths::{is_safe_component, StoragePaths};
pub use preferences::{FilePreferenceStore, InMemoryPreferenceStore, PreferenceStore};
