//! Slack request signature verification.
//!
//! Slack signs requests using HMAC-SHA256 over `v0:{timestamp}:{body}`.
//! Reference: https://api.slack.com/authentication/verifying-requests-from-slack

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::config::SigningSecret;
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Version prefix of both the base string and the signature header.
const VERSION: &str = "v0";

/// Verifies inbound requests against the shared signing secret.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: SigningSecret,
    max_age_seconds: u64,
}

impl SignatureVerifier {
    pub fn new(secret: SigningSecret, max_age_seconds: u64) -> Self {
        Self {
            secret,
            max_age_seconds,
        }
    }

    /// Verify `headers` and the raw `body` against the current clock.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.verify_at(headers, body, now)
    }

    /// Verify as of `now` (unix seconds).
    ///
    /// The timestamp window is checked before the HMAC, so a replayed request
    /// is rejected as stale even when its signature is otherwise valid.
    pub fn verify_at(&self, headers: &HeaderMap, body: &[u8], now: u64) -> Result<(), AuthError> {
        let signature = header_str(headers, SIGNATURE_HEADER)?;
        let timestamp = header_str(headers, TIMESTAMP_HEADER)?;

        // Parsed and signed from the same unmodified header value
        let request_time: u64 = timestamp.parse().map_err(|_| {
            warn!(timestamp = %timestamp, "slack_signature_invalid_timestamp");
            AuthError::Malformed(format!("timestamp `{}` is not an integer", timestamp))
        })?;

        let age = now.abs_diff(request_time);
        if age > self.max_age_seconds {
            warn!(
                request_time = request_time,
                current_time = now,
                age_seconds = age,
                max_age_seconds = self.max_age_seconds,
                "slack_signature_stale"
            );
            return Err(AuthError::StaleTimestamp {
                age_seconds: age,
                max_age_seconds: self.max_age_seconds,
            });
        }

        let provided = signature
            .strip_prefix("v0=")
            .ok_or_else(|| AuthError::Malformed("signature lacks `v0=` prefix".to_string()))
            .and_then(|hex_digest| {
                hex::decode(hex_digest)
                    .map_err(|_| AuthError::Malformed("signature is not hex".to_string()))
            })
            .inspect_err(|_| warn!("slack_signature_malformed"))?;

        let mut mac = HmacSha256::new_from_slice(self.secret.expose())
            .map_err(|_| AuthError::Malformed("unusable signing secret".to_string()))?;
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);

        // verify_slice compares in constant time
        mac.verify_slice(&provided).map_err(|_| {
            warn!(
                provided_length = provided.len(),
                body_length = body.len(),
                "slack_signature_mismatch"
            );
            AuthError::Mismatch
        })
    }
}

/// Compute the `v0=<hex>` signature Slack would send for `body`.
#[cfg(test)]
pub(crate) fn sign(secret: &SigningSecret, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.expose()).unwrap();
    mac.update(format!("{}:{}:", VERSION, timestamp).as_bytes());
    mac.update(body);
    format!("{}={}", VERSION, hex::encode(mac.finalize().into_bytes()))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AuthError> {
    let value = headers.get(name).ok_or_else(|| {
        warn!(header = name, "slack_signature_missing_header");
        AuthError::MissingHeader(name)
    })?;
    value
        .to_str()
        .map_err(|_| AuthError::Malformed(format!("header `{}` is not valid ASCII", name)))
}
