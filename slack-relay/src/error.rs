//! Error taxonomy for the relay.
//!
//! Each class maps to one stage of request handling:
//! - `AuthError`: signature verification, surfaced to Slack as 4xx
//! - `ParseError`: envelope classification
//! - `ConfigError`: startup only, fatal
//! - `DispatchError`: per-destination delivery, logged and never propagated

use thiserror::Error;

/// Why an inbound request failed signature verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing required header `{0}`")]
    MissingHeader(&'static str),

    #[error("malformed signature headers: {0}")]
    Malformed(String),

    #[error("signature does not match request body")]
    Mismatch,

    #[error("request timestamp is {age_seconds}s old (max {max_age_seconds}s)")]
    StaleTimestamp {
        age_seconds: u64,
        max_age_seconds: u64,
    },
}

/// Why a verified body could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),

    /// `envelope` is the top-level type being parsed, or `"envelope"` when the
    /// top-level `type` itself is absent.
    #[error("`{envelope}` payload is missing field `{field}`")]
    MissingField {
        envelope: &'static str,
        field: &'static str,
    },

    #[error("unknown envelope type `{0}`")]
    UnknownEnvelopeType(String),
}

/// Invalid startup configuration. The process must not serve traffic.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("signing secret is not set (SLACK_SIGNING_SECRET)")]
    MissingSecret,

    #[error("invalid value for {name}: `{value}`")]
    InvalidValue { name: &'static str, value: String },

    #[error("both RELAY_ROUTES and RELAY_ROUTES_FILE are set; choose one")]
    ConflictingRouteSources,

    #[error("invalid route entry `{entry}`: {reason}")]
    InvalidRouteSpec { entry: String, reason: String },

    #[error("event subtype `{0}` cannot be routed")]
    UnknownSubtype(String),

    #[error("invalid destination `{url}` for `{subtype}`: {reason}")]
    InvalidDestination {
        subtype: String,
        url: String,
        reason: String,
    },

    #[error("failed to read route file {path}: {source}")]
    RouteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Delivery failure for a single destination.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("destination responded with status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(String),
}
