//! Slack Relay - fan-out relay for Slack Events API webhooks.
//!
//! Receives events on a single endpoint, verifies Slack's request signature,
//! answers URL verification handshakes, and forwards every callback event
//! unchanged to the downstream endpoints subscribed to its subtype.
//!
//! ## Architecture
//!
//! ```text
//! Slack → POST /slack/event → verify → classify ─┬─ url_verification → challenge echoed
//!                                                 └─ event_callback → 200, fan-out → destinations
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod routes;
pub mod web;

// Re-export commonly used types
pub use config::{Config, SigningSecret};
pub use dispatch::{DispatchReport, Dispatcher};
pub use error::{AuthError, ConfigError, DispatchError, ParseError};
pub use event::{classify, EventEnvelope, EventKind};
pub use routes::RouteTable;
pub use web::{router, AppState};
