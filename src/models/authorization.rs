// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorizations awaiting a user decision.
//!
//! ```text
//! PENDING ──confirm──▶ CONFIRMED
//!    │ ────deny─────▶ DENIED
//!    └──expires_at──▶ EXPIRED
//! ```
//!
//! CONFIRMED, DENIED and EXPIRED are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Authorization status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizationStatus {
    #[default]
    Pending,
    Confirmed,
    Denied,
    Expired,
}

impl AuthorizationStatus {
    pub fn is_terminal(self) -> bool {
        self != AuthorizationStatus::Pending
    }

    fn as_str(self) -> &'static str {
        match self {
            AuthorizationStatus::Pending => "pending",
            AuthorizationStatus::Confirmed => "confirmed",
            AuthorizationStatus::Denied => "denied",
            AuthorizationStatus::Expired => "expired",
        }
    }
}

/// The user's answer to an authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Deny,
}

impl Decision {
    /// Value of the `confirm` field on the wire.
    pub fn as_confirm_flag(self) -> bool {
        matches!(self, Decision::Confirm)
    }

    fn target_status(self) -> AuthorizationStatus {
        match self {
            Decision::Confirm => AuthorizationStatus::Confirmed,
            Decision::Deny => AuthorizationStatus::Denied,
        }
    }
}

/// Payment fields a provider may attach to a description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<String>,
}

/// Context about where the action originated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Structured description with optional payment and consent sub-fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<ExtraDetails>,
}

/// Authorization description: plain text / HTML, or structured fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthorizationDescription {
    Text(String),
    Structured(StructuredDescription),
}

impl Default for AuthorizationDescription {
    fn default() -> Self {
        AuthorizationDescription::Text(String::new())
    }
}

impl AuthorizationDescription {
    /// Whether the description should be rendered as HTML.
    pub fn is_html(&self) -> bool {
        match self {
            AuthorizationDescription::Text(text) => looks_like_html(text),
            AuthorizationDescription::Structured(structured) => structured.html.is_some(),
        }
    }
}

fn looks_like_html(text: &str) -> bool {
    let lowered = text.trim_start().to_ascii_lowercase();
    lowered.starts_with("<!doctype html") || lowered.starts_with("<html") || lowered.contains("</")
}

/// A pending action awaiting the user's decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    pub id: String,
    pub connection_id: String,
    pub title: String,
    #[serde(default)]
    pub description: AuthorizationDescription,
    pub authorization_code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub status: AuthorizationStatus,
}

impl Authorization {
    pub fn is_not_expired(&self) -> bool {
        self.is_not_expired_at(Utc::now())
    }

    pub fn is_not_expired_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Move a PENDING authorization past its deadline to EXPIRED.
    ///
    /// Returns `true` when the authorization is (now) expired.
    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == AuthorizationStatus::Pending && !self.is_not_expired_at(now) {
            self.status = AuthorizationStatus::Expired;
        }
        self.status == AuthorizationStatus::Expired
    }

    /// Check that a decision may still be sent for this authorization.
    pub fn ensure_decidable(&mut self, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        if self.expire_if_due(now) {
            return Err(ProtocolError::AuthorizationExpired(self.id.clone()));
        }
        if self.status.is_terminal() {
            return Err(ProtocolError::InvalidTransition {
                entity: "authorization",
                from: self.status.as_str(),
                to: "resolved",
            });
        }
        Ok(())
    }

    /// Record a decision the backend has accepted.
    pub fn apply_decision(&mut self, decision: Decision) -> Result<(), ProtocolError> {
        if self.status != AuthorizationStatus::Pending {
            return Err(ProtocolError::InvalidTransition {
                entity: "authorization",
                from: self.status.as_str(),
                to: decision.target_status().as_str(),
            });
        }
        self.status = decision.target_status();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn pending(expires_in: Duration) -> Authorization {
        let now = Utc::now();
        Authorization {
            id: "auth-1".to_string(),
            connection_id: "conn-1".to_string(),
            title: "Confirm payment".to_string(),
            description: AuthorizationDescription::Text("Pay 10 EUR".to_string()),
            authorization_code: "code-xyz".to_string(),
            created_at: now,
            expires_at: now + expires_in,
            status: AuthorizationStatus::Pending,
        }
    }

    #[test]
    fn expiry_is_strict() {
        let auth = pending(Duration::minutes(5));
        assert!(auth.is_not_expired());
        assert!(auth.is_not_expired_at(auth.expires_at - Duration::seconds(1)));
        assert!(!auth.is_not_expired_at(auth.expires_at));
    }

    #[test]
    fn expired_authorization_cannot_be_decided() {
        let mut auth = pending(Duration::seconds(-1));
        let result = auth.ensure_decidable(Utc::now());
        assert!(matches!(result, Err(ProtocolError::AuthorizationExpired(_))));
        assert_eq!(auth.status, AuthorizationStatus::Expired);
    }

    #[test]
    fn decisions_are_terminal() {
        let mut auth = pending(Duration::minutes(5));
        auth.ensure_decidable(Utc::now()).unwrap();
        auth.apply_decision(Decision::Deny).unwrap();
        assert_eq!(auth.status, AuthorizationStatus::Denied);

        assert!(auth.apply_decision(Decision::Confirm).is_err());
        assert!(auth.ensure_decidable(Utc::now()).is_err());
        assert_eq!(auth.status, AuthorizationStatus::Denied);
    }

    #[test]
    fn terminal_status_is_not_downgraded_to_expired() {
        let mut auth = pending(Duration::seconds(-1));
        auth.status = AuthorizationStatus::Confirmed;
        assert!(!auth.expire_if_due(Utc::now()));
        assert_eq!(auth.status, AuthorizationStatus::Confirmed);
    }

    #[test]
    fn parses_plain_description_with_default_status() {
        let auth: Authorization = serde_json::from_value(json!({
            "id": "1",
            "connection_id": "2",
            "title": "Login",
            "description": "<html><body>Sign in</body></html>",
            "authorization_code": "abc",
            "created_at": "2026-01-01T10:00:00Z",
            "expires_at": "2026-01-01T10:05:00Z"
        }))
        .unwrap();

        assert_eq!(auth.status, AuthorizationStatus::Pending);
        assert!(auth.description.is_html());
    }

    #[test]
    fn parses_structured_description() {
        let description: AuthorizationDescription = serde_json::from_value(json!({
            "payment": { "payee": "Shop", "amount": "10.00 EUR", "reference": "INV-1" },
            "text": "Card payment",
            "extra": { "device": "Chrome", "ip": "10.0.0.1" }
        }))
        .unwrap();

        match &description {
            AuthorizationDescription::Structured(structured) => {
                let payment = structured.payment.as_ref().unwrap();
                assert_eq!(payment.payee.as_deref(), Some("Shop"));
                assert_eq!(payment.amount.as_deref(), Some("10.00 EUR"));
                assert_eq!(
                    structured.extra.as_ref().unwrap().ip.as_deref(),
                    Some("10.0.0.1")
                );
            }
            other => panic!("expected structured description, got {other:?}"),
        }
        assert!(!description.is_html());
    }

    #[test]
    fn decision_flag() {
        assert!(Decision::Confirm.as_confirm_flag());
        assert!(!Decision::Deny.as_confirm_flag());
    }
}
