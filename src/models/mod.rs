// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! - **Connections**: enrolled banking relationships and their lifecycle
//! - **Authorizations**: pending decisions and their lifecycle
//! - **Wire**: JSON payloads exchanged with the backend

pub mod authorization;
pub mod connection;
pub mod wire;

pub use authorization::{
    Authorization, AuthorizationDescription, AuthorizationStatus, Decision, ExtraDetails,
    PaymentDetails, StructuredDescription,
};
pub use connection::{Connection, ConnectionStatus};
pub use wire::{
    ActionResult, DecisionData, EncryptedAuthorization, EncryptedBundle, EnrollmentData,
    EnrollmentResult, Envelope, ErrorBody, ProviderConfiguration,
};
