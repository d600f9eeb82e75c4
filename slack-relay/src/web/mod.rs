//! Web server module for the inbound Slack endpoint.
//!
//! This module provides a thin web server that:
//! - Receives Slack Events API webhooks on a single route
//! - Verifies the request signature
//! - Answers URL verification handshakes inline
//! - Acknowledges callbacks and fans them out in the background

pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{health, slack_event, AppState, HealthResponse};
pub use signature::SignatureVerifier;

/// Path Slack is configured to deliver events to.
pub const EVENT_PATH: &str = "/slack/event";

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(EVENT_PATH, post(slack_event))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
