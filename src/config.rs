// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `SUPABASE_URL` | Identity provider base URL | unset: in-memory provider |
//! | `SUPABASE_ANON_KEY` | Identity provider public API key | required with `SUPABASE_URL` |
//! | `LB_PROTECTED_PATHS` | Comma-separated guarded path patterns | `/dashboard/:path*` |
//! | `LB_MARKER_SECRET` | HMAC key for signed `lb_auth` markers | unset: plain markers |
//! | `LB_MARKER_TTL_SECS` | Lifetime of signed markers, at most one year | `3600` |
//! | `COOKIE_SECURE` | Set `Secure` on the marker cookie | `false` |
//! | `TLS_CERT_PATH` | PEM certificate chain | unset: plain HTTP |
//! | `TLS_KEY_PATH` | PEM private key | required with `TLS_CERT_PATH` |

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use tracing::warn;

use crate::auth::guard::{ProtectedPaths, DEFAULT_PROTECTED_PATTERN};
use crate::identity::{IdentityProvider, MemoryIdentity, SupabaseIdentity};
use crate::session::{BoundaryMarker, MarkerSigner};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";
pub const PROTECTED_PATHS_ENV: &str = "LB_PROTECTED_PATHS";
pub const MARKER_SECRET_ENV: &str = "LB_MARKER_SECRET";
pub const MARKER_TTL_ENV: &str = "LB_MARKER_TTL_SECS";
pub const COOKIE_SECURE_ENV: &str = "COOKIE_SECURE";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";
pub const DEFAULT_MARKER_TTL_SECS: u64 = 3600;
/// Longest accepted marker lifetime (one year).
pub const MAX_MARKER_TTL_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },

    #[error("{set} is set but {missing} is not")]
    Incomplete {
        set: &'static str,
        missing: &'static str,
    },

    #[error("Failed to build identity provider: {0}")]
    Identity(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Identity provider connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

/// TLS certificate and key locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    /// `None` selects the in-memory identity provider
    pub supabase: Option<SupabaseConfig>,
    pub protected_patterns: Vec<String>,
    pub marker_secret: Option<String>,
    pub marker_ttl: Duration,
    pub cookie_secure: bool,
    /// `None` serves plain HTTP
    pub tls: Option<TlsPaths>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_format", &self.log_format)
            .field("supabase_url", &self.supabase.as_ref().map(|s| &s.url))
            .field("protected_patterns", &self.protected_patterns)
            .field("signed_marker", &self.marker_secret.is_some())
            .field("marker_ttl", &self.marker_ttl)
            .field("cookie_secure", &self.cookie_secure)
            .field("tls", &self.tls)
            .finish()
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}

fn paired<T>(
    first: (&'static str, Option<String>),
    second: (&'static str, Option<String>),
    build: impl FnOnce(String, String) -> T,
) -> Result<Option<T>, ConfigError> {
    match (first.1, second.1) {
        (Some(a), Some(b)) => Ok(Some(build(a, b))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(ConfigError::Incomplete {
            set: first.0,
            missing: second.0,
        }),
        (None, Some(_)) => Err(ConfigError::Incomplete {
            set: second.0,
            missing: first.0,
        }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Parse configuration from any variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env_optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let host = env_optional(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match env_optional(PORT_ENV) {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                var: PORT_ENV,
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let log_format = match env_optional(LOG_FORMAT_ENV).as_deref() {
            None => LogFormat::default(),
            Some(v) if v.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(v) => {
                return Err(ConfigError::InvalidValue {
                    var: LOG_FORMAT_ENV,
                    value: v.to_string(),
                })
            }
        };

        let supabase = paired(
            (SUPABASE_URL_ENV, env_optional(SUPABASE_URL_ENV)),
            (SUPABASE_ANON_KEY_ENV, env_optional(SUPABASE_ANON_KEY_ENV)),
            |url, anon_key| SupabaseConfig { url, anon_key },
        )?;

        let protected_patterns: Vec<String> = env_optional(PROTECTED_PATHS_ENV)
            .unwrap_or_else(|| DEFAULT_PROTECTED_PATTERN.to_string())
            .split(',')
            .map(|pattern| pattern.trim().to_string())
            .filter(|pattern| !pattern.is_empty())
            .collect();

        let marker_ttl = match env_optional(MARKER_TTL_ENV) {
            Some(value) => match value.parse::<u64>() {
                Ok(secs) if (1..=MAX_MARKER_TTL_SECS).contains(&secs) => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: MARKER_TTL_ENV,
                        value,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_MARKER_TTL_SECS),
        };

        let cookie_secure = match env_optional(COOKIE_SECURE_ENV) {
            Some(value) => parse_bool(COOKIE_SECURE_ENV, &value)?,
            None => false,
        };

        let tls = paired(
            (TLS_CERT_PATH_ENV, env_optional(TLS_CERT_PATH_ENV)),
            (TLS_KEY_PATH_ENV, env_optional(TLS_KEY_PATH_ENV)),
            |cert, key| TlsPaths {
                cert: cert.into(),
                key: key.into(),
            },
        )?;

        Ok(Self {
            host,
            port,
            log_format,
            supabase,
            protected_patterns,
            marker_secret: env_optional(MARKER_SECRET_ENV),
            marker_ttl,
            cookie_secure,
            tls,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ConfigError::InvalidValue {
            var: HOST_ENV,
            value: self.host.clone(),
        })
    }

    pub fn protected_paths(&self) -> ProtectedPaths {
        ProtectedPaths::from_patterns(&self.protected_patterns)
    }

    /// Marker issued by the auth endpoints and verified by the guard.
    pub fn boundary_marker(&self) -> Result<BoundaryMarker, ConfigError> {
        let marker = match &self.marker_secret {
            Some(secret) => {
                let signer = MarkerSigner::new(secret.as_bytes(), self.marker_ttl).map_err(|_| {
                    ConfigError::InvalidValue {
                        var: MARKER_SECRET_ENV,
                        value: "<redacted>".to_string(),
                    }
                })?;
                BoundaryMarker::signed(signer)
            }
            None => {
                warn!(
                    "{MARKER_SECRET_ENV} not set, issuing plain lb_auth markers that clients can forge"
                );
                BoundaryMarker::plain()
            }
        };
        Ok(marker.with_secure(self.cookie_secure))
    }

    pub fn identity_provider(&self) -> Result<Arc<dyn IdentityProvider>, ConfigError> {
        match &self.supabase {
            Some(supabase) => {
                let provider = SupabaseIdentity::new(&supabase.url, &supabase.anon_key)
                    .map_err(|e| ConfigError::Identity(e.to_string()))?;
                Ok(Arc::new(provider))
            }
            None => {
                warn!(
                    "{SUPABASE_URL_ENV} not set, using in-memory identity provider (development mode)"
                );
                Ok(Arc::new(MemoryIdentity::new()))
            }
        }
    }
}
