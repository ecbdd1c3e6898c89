// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names and defaults. The crate never reads the
//! environment on its own; a host calls [`ChannelConfig::from_env`] if it
//! wants environment-driven settings.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTHENTICATOR_DATA_DIR` | Root directory for connection records and keys | `./authenticator-data` |
//! | `AUTHENTICATOR_ACCEPT_LANGUAGE` | `Accept-Language` header value | `en` |
//! | `AUTHENTICATOR_RETURN_URL` | Redirect URL sent on enrollment | `authenticator://oauth/redirect` |
//! | `AUTHENTICATOR_PLATFORM` | Platform name sent on enrollment | `android` |
//! | `AUTHENTICATOR_SIGNATURE_TTL_SECS` | Lifetime of request signatures | `300` |
//! | `AUTHENTICATOR_POLL_INTERVAL_MS` | Polling interval | `3000` |
//! | `AUTHENTICATOR_HTTP_TIMEOUT_SECS` | HTTP client timeout | `15` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::time::Duration;

use crate::signing::DEFAULT_SIGNATURE_TTL_SECS;
use crate::storage::paths::DATA_ROOT;

pub const DATA_DIR_ENV: &str = "AUTHENTICATOR_DATA_DIR";
pub const ACCEPT_LANGUAGE_ENV: &str = "AUTHENTICATOR_ACCEPT_LANGUAGE";
pub const RETURN_URL_ENV: &str = "AUTHENTICATOR_RETURN_URL";
pub const PLATFORM_ENV: &str = "AUTHENTICATOR_PLATFORM";
pub const SIGNATURE_TTL_ENV: &str = "AUTHENTICATOR_SIGNATURE_TTL_SECS";
pub const POLL_INTERVAL_ENV: &str = "AUTHENTICATOR_POLL_INTERVAL_MS";
pub const HTTP_TIMEOUT_ENV: &str = "AUTHENTICATOR_HTTP_TIMEOUT_SECS";

/// Environment variable selecting the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const RUST_LOG_DEFAULT: &str = "info";

pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en";
pub const DEFAULT_RETURN_URL: &str = "authenticator://oauth/redirect";
pub const DEFAULT_PLATFORM: &str = "android";

/// Polling interval used by both scheduler specializations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Settings shared by the channel and the schedulers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub data_dir: PathBuf,
    pub accept_language: String,
    pub return_url: String,
    pub platform: String,
    pub signature_ttl: Duration,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_ROOT),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            return_url: DEFAULT_RETURN_URL.to_string(),
            platform: DEFAULT_PLATFORM.to_string(),
            signature_ttl: Duration::from_secs(DEFAULT_SIGNATURE_TTL_SECS as u64),
            poll_interval: DEFAULT_POLL_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl ChannelConfig {
    /// Defaults overridden by whichever variables are set.
    ///
    /// Unparseable numeric values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let number = |name: &str| non_empty(name).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            data_dir: non_empty(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            accept_language: non_empty(ACCEPT_LANGUAGE_ENV).unwrap_or(defaults.accept_language),
            return_url: non_empty(RETURN_URL_ENV).unwrap_or(defaults.return_url),
            platform: non_empty(PLATFORM_ENV).unwrap_or(defaults.platform),
            signature_ttl: number(SIGNATURE_TTL_ENV)
                .map(Duration::from_secs)
                .unwrap_or(defaults.signature_ttl),
            poll_interval: number(POLL_INTERVAL_ENV)
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            http_timeout: number(HTTP_TIMEOUT_ENV)
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
        }
    }

    /// Signature lifetime as a `chrono` duration for the request signer.
    pub fn signature_ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.signature_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_SIGNATURE_TTL_SECS))
    }
}
