//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup. Any problem is a `ConfigError` and the
//! process must exit before binding its listener.

use std::env;
use std::fmt;
use std::fs;

use tracing::warn;

use crate::error::ConfigError;
use crate::routes::RouteTable;

/// Shared Slack signing secret. `Debug` output is redacted.
#[derive(Clone)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Slack signing secret for HMAC signature verification
    pub signing_secret: SigningSecret,

    /// Maximum age in seconds for Slack request timestamps
    pub signature_max_age: u64,

    /// Per-destination timeout for forwarded requests, in milliseconds
    pub dispatch_timeout_ms: u64,

    /// Event subtype to destination mapping
    pub routes: RouteTable,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let signing_secret = lookup("SLACK_SIGNING_SECRET")
            .or_else(|| lookup("SLACK_COPROXY_SLACK_SIGNING_SECRET"))
            .filter(|s| !s.trim().is_empty())
            .map(SigningSecret::new)
            .ok_or(ConfigError::MissingSecret)?;

        let routes = match (lookup("RELAY_ROUTES"), lookup("RELAY_ROUTES_FILE")) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingRouteSources),
            (Some(spec), None) => RouteTable::parse_spec(&spec)?,
            (None, Some(path)) => {
                let json = fs::read_to_string(&path)
                    .map_err(|source| ConfigError::RouteFile { path, source })?;
                RouteTable::from_json(&json)?
            }
            (None, None) => RouteTable::default(),
        };
        if routes.is_empty() {
            warn!("no routes configured, callback events will be acknowledged and dropped");
        }

        Ok(Config {
            port: parse_or(&lookup, "PORT", 5000)?,
            signing_secret,
            signature_max_age: parse_or(&lookup, "SLACK_SIGNATURE_MAX_AGE", 300)?, // 5 minutes
            dispatch_timeout_ms: parse_or(&lookup, "DISPATCH_TIMEOUT_MS", 5000)?,
            routes,
        })
    }
}

/// Parse a numeric variable, falling back to `default` when it is unset.
fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Ok(value),
            Err(_) => Err(ConfigError::InvalidValue { name, value: raw }),
        },
    }
}
