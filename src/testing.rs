// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test doubles: an in-process provider backend speaking the authenticator
//! protocol, plus helpers to wire a channel against it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::channel::{
    AuthorizationChannel, ACCESS_TOKEN_HEADER, API_PREFIX, EXPIRES_AT_HEADER, SIGNATURE_HEADER,
};
use crate::config::ChannelConfig;
use crate::crypto::{self, decode_base64, DhKeyPair};
use crate::keys::{InMemoryKeyStore, KeyManager, PublicKeyHandle};
use crate::models::{
    Authorization, AuthorizationDescription, AuthorizationStatus, EncryptedAuthorization,
    EnrollmentData, Envelope, ProviderConfiguration,
};
use crate::signing::build_canonical_string;
use crate::storage::InMemoryConnectionRepository;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

pub(crate) const CONNECT_URL: &str = "https://bank.test";
pub(crate) const CONFIGURATION_URL: &str = "https://bank.test/configuration";

struct Device {
    connection_id: String,
    public_key: PublicKeyHandle,
}

#[derive(Default)]
struct BankState {
    requests: Vec<HttpRequest>,
    devices: HashMap<String, Device>,
    authorizations: Vec<Authorization>,
    decisions: Vec<(String, bool)>,
    scripted: VecDeque<Result<HttpResponse, TransportError>>,
    next_id: u32,
    withhold_tokens: bool,
}

/// Provider backend that enrolls devices, verifies request signatures and
/// encrypts authorizations for the enrolled device keys.
pub(crate) struct SimulatedBank {
    pub dh: DhKeyPair,
    state: Mutex<BankState>,
}

fn json_response(status: u16, value: Value) -> HttpResponse {
    HttpResponse {
        status,
        body: value.to_string(),
    }
}

fn error_response(status: u16, class: &str) -> HttpResponse {
    json_response(
        status,
        json!({ "error_class": class, "error_message": format!("{class} (simulated)") }),
    )
}

impl SimulatedBank {
    pub fn new() -> Self {
        Self {
            dh: DhKeyPair::generate(),
            state: Mutex::new(BankState::default()),
        }
    }

    pub fn configuration(&self) -> ProviderConfiguration {
        ProviderConfiguration {
            connect_url: CONNECT_URL.to_string(),
            code: "demobank".to_string(),
            name: "Demo Bank".to_string(),
            logo_url: Some(format!("{CONNECT_URL}/logo.png")),
            support_email: Some("support@bank.test".to_string()),
            version: Some("1".to_string()),
            dh_public_key: self.dh.public_key().to_base64(),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, BankState> {
        self.state.lock().unwrap()
    }

    /// Enrollment responses omit the access token until the device is
    /// activated out of band.
    pub fn withhold_tokens(&self) {
        self.state().withhold_tokens = true;
    }

    /// Answer the next request with `response` instead of routing it.
    pub fn script(&self, response: Result<HttpResponse, TransportError>) {
        self.state().scripted.push_back(response);
    }

    pub fn script_error(&self, status: u16, class: &str) {
        self.script(Ok(error_response(status, class)));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state().requests.clone()
    }

    pub fn request_count(&self, method: HttpMethod) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| r.method == method)
            .count()
    }

    pub fn decisions(&self) -> Vec<(String, bool)> {
        self.state().decisions.clone()
    }

    /// PEM the bank recovered from a device's enrollment bundle.
    pub fn device_public_key_pem(&self, connection_id: &str) -> Option<String> {
        self.state()
            .devices
            .values()
            .find(|d| d.connection_id == connection_id)
            .map(|d| d.public_key.to_pem().unwrap())
    }

    /// Forget a device server-side (e.g. revoked from online banking).
    pub fn forget_device(&self, connection_id: &str) {
        self.state()
            .devices
            .retain(|_, d| d.connection_id != connection_id);
    }

    /// Queue an authorization for a connection, expiring after `ttl`.
    pub fn add_authorization(
        &self,
        connection_id: &str,
        title: &str,
        ttl: Duration,
    ) -> Authorization {
        let mut state = self.state();
        state.next_id += 1;
        let now = Utc::now();
        let authorization = Authorization {
            id: format!("auth-{}", state.next_id),
            connection_id: connection_id.to_string(),
            title: title.to_string(),
            description: AuthorizationDescription::Text(format!("{title} description")),
            authorization_code: format!("code-{}", state.next_id),
            created_at: now,
            expires_at: now + ttl,
            status: AuthorizationStatus::Pending,
        };
        state.authorizations.push(authorization.clone());
        authorization
    }

    /// Encrypt an authorization for the device enrolled under `connection_id`.
    pub fn encrypt_for(
        &self,
        connection_id: &str,
        authorization: &Authorization,
    ) -> EncryptedAuthorization {
        let state = self.state();
        let device = state
            .devices
            .values()
            .find(|d| d.connection_id == connection_id)
            .unwrap();
        Self::encrypt(device, authorization)
    }

    fn encrypt(device: &Device, authorization: &Authorization) -> EncryptedAuthorization {
        let plaintext = serde_json::to_vec(authorization).unwrap();
        EncryptedAuthorization {
            id: authorization.id.clone(),
            connection_id: authorization.connection_id.clone(),
            bundle: crypto::hybrid_encrypt(&plaintext, &device.public_key).unwrap(),
        }
    }

    fn route(&self, request: &HttpRequest) -> HttpResponse {
        let path = request
            .url
            .strip_prefix(CONNECT_URL)
            .unwrap_or(&request.url)
            .to_string();

        if request.method == HttpMethod::Get && request.url == CONFIGURATION_URL {
            return json_response(200, json!({ "data": self.configuration() }));
        }

        let Some(api_path) = path.strip_prefix(API_PREFIX) else {
            return error_response(404, "NotFound");
        };

        match (request.method, api_path) {
            (HttpMethod::Post, "/connections") => self.enroll(request),
            (method, rest) => {
                let mut state = self.state();
                let token = match authenticate(&state, request) {
                    Ok(token) => token,
                    Err(response) => return response,
                };
                handle_signed(&mut state, &token, method, rest, request)
            }
        }
    }

    fn enroll(&self, request: &HttpRequest) -> HttpResponse {
        let Some(envelope) = request
            .body
            .as_deref()
            .and_then(|b| serde_json::from_str::<Envelope<EnrollmentData>>(b).ok())
        else {
            return error_response(400, "WrongRequestFormat");
        };
        let bundle = &envelope.data.public_key_bundle;
        let Ok(pem) = crypto::open_enrollment_bundle(bundle, &self.dh) else {
            return error_response(400, "InvalidPublicKeyBundle");
        };
        let pem_text = String::from_utf8_lossy(&pem);
        let Ok(public_key) = PublicKeyHandle::from_pem("device", &pem_text) else {
            return error_response(400, "InvalidPublicKey");
        };

        let mut state = self.state();
        state.next_id += 1;
        let connection_id = format!("conn-{}", state.next_id);
        let token = format!("token-{}", state.next_id);
        state.devices.insert(
            token.clone(),
            Device {
                connection_id: connection_id.clone(),
                public_key,
            },
        );

        if state.withhold_tokens {
            let connect_url = format!("{CONNECT_URL}/oauth/{connection_id}");
            json_response(
                200,
                json!({ "data": { "id": connection_id, "connect_url": connect_url } }),
            )
        } else {
            json_response(200, json!({ "data": { "id": connection_id, "access_token": token } }))
        }
    }
}

/// Check the access token and the request signature.
fn authenticate(state: &BankState, request: &HttpRequest) -> Result<String, HttpResponse> {
    let token = request
        .header_value(ACCESS_TOKEN_HEADER)
        .ok_or_else(|| error_response(401, "AccessTokenMissing"))?;
    let device = state
        .devices
        .get(token)
        .ok_or_else(|| error_response(401, "InvalidAccessToken"))?;

    let expires_at: i64 = request
        .header_value(EXPIRES_AT_HEADER)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| error_response(400, "ExpiresAtMissing"))?;
    if expires_at <= Utc::now().timestamp() {
        return Err(error_response(400, "RequestExpired"));
    }
    let signature = request
        .header_value(SIGNATURE_HEADER)
        .and_then(|v| decode_base64(v).ok())
        .ok_or_else(|| error_response(400, "SignatureMissing"))?;

    let canonical = build_canonical_string(
        request.method.as_str(),
        &request.url,
        expires_at,
        request.body.as_deref().unwrap_or_default(),
    );
    if !crypto::verify(canonical.as_bytes(), &signature, &device.public_key) {
        return Err(error_response(401, "InvalidSignature"));
    }
    Ok(token.to_string())
}

fn handle_signed(
    state: &mut BankState,
    token: &str,
    method: HttpMethod,
    path: &str,
    request: &HttpRequest,
) -> HttpResponse {
    let Some(device) = state.devices.get(token) else {
        return error_response(401, "InvalidAccessToken");
    };
    let connection_id = device.connection_id.clone();

    match (method, path) {
        (HttpMethod::Get, "/authorizations") => {
            let items: Vec<EncryptedAuthorization> = state
                .authorizations
                .iter()
                .filter(|a| a.connection_id == connection_id)
                .map(|a| SimulatedBank::encrypt(device, a))
                .collect();
            json_response(200, json!({ "data": items }))
        }
        (HttpMethod::Delete, "/connections") => {
            state.devices.remove(token);
            json_response(200, json!({ "data": { "success": true } }))
        }
        (method, rest) => {
            let Some(id) = rest.strip_prefix("/authorizations/") else {
                return error_response(404, "NotFound");
            };
            let Some(index) = state
                .authorizations
                .iter()
                .position(|a| a.id == id && a.connection_id == connection_id)
            else {
                return error_response(404, "AuthorizationNotFound");
            };

            match method {
                HttpMethod::Get => {
                    let item = SimulatedBank::encrypt(device, &state.authorizations[index]);
                    json_response(200, json!({ "data": item }))
                }
                HttpMethod::Put => {
                    let body: Value = request
                        .body
                        .as_deref()
                        .and_then(|b| serde_json::from_str(b).ok())
                        .unwrap_or(Value::Null);
                    let confirm = body["data"]["confirm"].as_bool();
                    let code = body["data"]["authorization_code"].as_str();
                    match (confirm, code) {
                        (Some(confirm), Some(code))
                            if code == state.authorizations[index].authorization_code =>
                        {
                            let removed = state.authorizations.remove(index);
                            state.decisions.push((removed.id.clone(), confirm));
                            let data = json!({ "success": true, "id": removed.id });
                            json_response(200, json!({ "data": data }))
                        }
                        _ => error_response(400, "InvalidAuthorizationCode"),
                    }
                }
                _ => error_response(405, "MethodNotAllowed"),
            }
        }
    }
}

#[async_trait]
impl HttpTransport for SimulatedBank {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let scripted = {
            let mut state = self.state();
            state.requests.push(request.clone());
            state.scripted.pop_front()
        };
        match scripted {
            Some(result) => result,
            None => Ok(self.route(&request)),
        }
    }
}

/// A channel wired to a fresh bank with in-memory stores.
pub(crate) fn channel_with_bank() -> (Arc<SimulatedBank>, AuthorizationChannel) {
    let bank = Arc::new(SimulatedBank::new());
    let channel = AuthorizationChannel::new(
        bank.clone(),
        KeyManager::new(Arc::new(InMemoryKeyStore::new())),
        Arc::new(InMemoryConnectionRepository::new()),
        ChannelConfig::default(),
    );
    (bank, channel)
}
