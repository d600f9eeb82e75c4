//! Slack Events API envelope classification.
//!
//! Reference: https://api.slack.com/apis/events-api#receiving-events

use std::fmt;

use axum::body::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;

/// Top-level type of the one-time endpoint ownership handshake.
pub const URL_VERIFICATION: &str = "url_verification";

/// Top-level type wrapping every regular event notification.
pub const EVENT_CALLBACK: &str = "event_callback";

/// Subtype of a callback event, taken from `event.type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    AppMention,
    /// Any other inner type. Never has subscribers.
    Unhandled(String),
}

impl EventKind {
    /// Map an `event.type` tag to its kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "message" => EventKind::Message,
            "app_mention" => EventKind::AppMention,
            other => EventKind::Unhandled(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Message => "message",
            EventKind::AppMention => "app_mention",
            EventKind::Unhandled(tag) => tag.as_str(),
        }
    }

    /// Whether destinations may be configured for this kind.
    pub fn is_routable(&self) -> bool {
        !matches!(self, EventKind::Unhandled(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified `event_callback` notification.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub kind: EventKind,
    pub event_id: Option<String>,
    pub team_id: Option<String>,
    /// The payload exactly as received.
    pub raw: Bytes,
}

/// Parsed inbound envelope.
#[derive(Debug, Clone)]
pub enum EventEnvelope {
    /// Handshake; `challenge` must be echoed back verbatim.
    Challenge { challenge: String },
    Callback(CallbackEvent),
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    challenge: Option<String>,
    event: Option<Value>,
    event_id: Option<String>,
    team_id: Option<String>,
}

/// Classify a raw (already verified) request body.
///
/// Only the fields needed for routing are inspected; the rest of the payload
/// is left opaque and travels on in `CallbackEvent::raw`.
pub fn classify(body: &Bytes) -> Result<EventEnvelope, ParseError> {
    let envelope: RawEnvelope =
        serde_json::from_slice(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let kind = envelope.kind.ok_or(ParseError::MissingField {
        envelope: "envelope",
        field: "type",
    })?;

    match kind.as_str() {
        URL_VERIFICATION => {
            let challenge = envelope.challenge.ok_or(ParseError::MissingField {
                envelope: URL_VERIFICATION,
                field: "challenge",
            })?;
            Ok(EventEnvelope::Challenge { challenge })
        }
        EVENT_CALLBACK => {
            let event = envelope.event.ok_or(ParseError::MissingField {
                envelope: EVENT_CALLBACK,
                field: "event",
            })?;
            let tag = event
                .get("type")
                .and_then(Value::as_str)
                .ok_or(ParseError::MissingField {
                    envelope: EVENT_CALLBACK,
                    field: "event.type",
                })?;

            Ok(EventEnvelope::Callback(CallbackEvent {
                kind: EventKind::from_tag(tag),
                event_id: envelope.event_id,
                team_id: envelope.team_id,
                raw: body.clone(),
            }))
        }
        other => Err(ParseError::UnknownEnvelopeType(other.to_string())),
    }
}
