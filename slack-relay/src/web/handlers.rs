//! Slack Events API endpoint handlers.
//!
//! The event handler only:
//! 1. Verifies the request signature against the raw body
//! 2. Classifies the envelope
//! 3. Answers handshakes inline, or hands callbacks to the dispatcher
//!
//! Fan-out runs on its own task, so Slack is acknowledged without waiting on
//! downstream latency.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{AuthError, ParseError};
use crate::event::{classify, EventEnvelope, URL_VERIFICATION};
use crate::web::signature::SignatureVerifier;
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<SignatureVerifier>,
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Build state from a loaded config and the process-wide HTTP client.
    pub fn new(config: Config, client: reqwest::Client) -> Self {
        let verifier = SignatureVerifier::new(
            config.signing_secret,
            config.signature_max_age,
        );
        let dispatcher = Dispatcher::new(
            client,
            Arc::new(config.routes),
            Duration::from_millis(config.dispatch_timeout_ms),
        );

        Self {
            verifier: Arc::new(verifier),
            dispatcher,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Slack Events
// =============================================================================

/// Status returned to Slack for a failed verification.
pub fn auth_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::MissingHeader(_) | AuthError::Malformed(_) => StatusCode::BAD_REQUEST,
        AuthError::Mismatch | AuthError::StaleTimestamp { .. } => StatusCode::UNAUTHORIZED,
    }
}

/// Status returned to Slack for a body that could not be classified.
///
/// Only a broken handshake or unreadable JSON is reported back. Anything else
/// is acknowledged so Slack does not keep retrying a payload we cannot route.
pub fn parse_status(err: &ParseError) -> StatusCode {
    match err {
        ParseError::InvalidJson(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ParseError::MissingField {
            envelope: URL_VERIFICATION,
            ..
        } => StatusCode::BAD_REQUEST,
        ParseError::MissingField { .. } | ParseError::UnknownEnvelopeType(_) => StatusCode::OK,
    }
}

/// Slack Events API endpoint.
///
/// The body is captured once as immutable `Bytes` and shared by reference
/// with verification, classification and forwarding.
pub async fn slack_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let retry_num = headers
        .get("x-slack-retry-num")
        .and_then(|v| v.to_str().ok());
    let retry_reason = headers
        .get("x-slack-retry-reason")
        .and_then(|v| v.to_str().ok());

    info!(
        body_length = body.len(),
        retry_num = ?retry_num,
        retry_reason = ?retry_reason,
        "slack_event_received"
    );

    if let Err(e) = state.verifier.verify(&headers, &body) {
        let status = auth_status(&e);
        warn!(error = %e, status = status.as_u16(), "slack_event_rejected");
        return status.into_response();
    }

    let envelope = match classify(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            let status = parse_status(&e);
            if status.is_server_error() {
                error!(error = %e, "slack_event_parse_failed");
            } else {
                warn!(error = %e, status = status.as_u16(), "slack_event_unclassified");
            }
            return status.into_response();
        }
    };

    match envelope {
        EventEnvelope::Challenge { challenge } => {
            info!(challenge_length = challenge.len(), "slack_url_verification");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain")],
                challenge,
            )
                .into_response()
        }
        EventEnvelope::Callback(event) => {
            info!(
                subtype = %event.kind,
                event_id = ?event.event_id,
                team_id = ?event.team_id,
                "slack_event_callback"
            );
            state.dispatcher.spawn(event.kind, headers, event.raw);
            StatusCode::OK.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    use axum::{
        body::{to_bytes, Body},
        http::{HeaderValue, Request},
        Router,
    };
    use tokio::time::timeout;
    use tower::ServiceExt;

    use crate::config::SigningSecret;
    use crate::dispatch::test_support::{client, downstream, hook_url, refused_addr};
    use crate::routes::RouteTable;
    use crate::web::router;
    use crate::web::signature::{sign, SIGNATURE_HEADER, TIMESTAMP_HEADER};

    const SECRET: &str = "test-signing-secret";

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    fn app(routes: RouteTable) -> Router {
        let config = Config {
            port: 0,
            signing_secret: SigningSecret::new(SECRET),
            signature_max_age: 300,
            dispatch_timeout_ms: 2000,
            routes,
        };
        router(AppState::new(config, client()))
    }

    fn signed_request(body: &str, timestamp: u64) -> Request<Body> {
        let ts = timestamp.to_string();
        let signature = sign(&SigningSecret::new(SECRET), &ts, body.as_bytes());
        Request::post("/slack/event")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, ts)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        to_bytes(response.into_body(), usize::MAX).await.unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(RouteTable::default())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&body_bytes(response).await[..], br#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_url_verification_echoes_challenge() {
        let (addr, mut rx) = downstream(StatusCode::OK).await;
        let routes = RouteTable::from_entries([("message", vec![hook_url(addr)])]).unwrap();

        let response = app(routes)
            .oneshot(signed_request(
                r#"{"type":"url_verification","challenge":"abc123"}"#,
                now(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
        assert_eq!(&body_bytes(response).await[..], b"abc123");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_missing_signature_is_bad_request() {
        let request = Request::post("/slack/event")
            .header(TIMESTAMP_HEADER, now().to_string())
            .body(Body::from(r#"{"type":"url_verification","challenge":"x"}"#))
            .unwrap();

        let response = app(RouteTable::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthorized_and_not_dispatched() {
        let (addr, mut rx) = downstream(StatusCode::OK).await;
        let routes = RouteTable::from_entries([("message", vec![hook_url(addr)])]).unwrap();

        let body = r#"{"type":"event_callback","event":{"type":"message"}}"#;
        let mut request = signed_request(body, now());
        request.headers_mut().insert(
            SIGNATURE_HEADER,
            HeaderValue::from_static(
                "v0=0000000000000000000000000000000000000000000000000000000000000000",
            ),
        );

        let response = app(routes).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_bytes(response).await.is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_signature_checked_before_body_is_parsed() {
        // Unparseable body would be a 500 if it reached the classifier
        let mut request = signed_request("{not json", now());
        request.headers_mut().insert(
            SIGNATURE_HEADER,
            HeaderValue::from_static(
                "v0=0000000000000000000000000000000000000000000000000000000000000000",
            ),
        );

        let response = app(RouteTable::default()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_timestamp_is_unauthorized() {
        let response = app(RouteTable::default())
            .oneshot(signed_request(
                r#"{"type":"url_verification","challenge":"abc123"}"#,
                now() - 600,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_json_is_server_error() {
        let response = app(RouteTable::default())
            .oneshot(signed_request("{not json", now()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_handshake_without_challenge_is_bad_request() {
        let response = app(RouteTable::default())
            .oneshot(signed_request(r#"{"type":"url_verification"}"#, now()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_envelope_is_acknowledged() {
        let response = app(RouteTable::default())
            .oneshot(signed_request(r#"{"type":"app_rate_limited"}"#, now()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_callback_fans_out_raw_body() {
        let (a, mut rx_a) = downstream(StatusCode::OK).await;
        let (b, mut rx_b) = downstream(StatusCode::OK).await;
        let routes =
            RouteTable::from_entries([("message", vec![hook_url(a), hook_url(b)])]).unwrap();

        // Deliberately irregular spacing: forwarding must not re-serialize
        let body = r#"{ "type" : "event_callback", "event_id":"Ev9", "event": {"type":"message","text":"hi"} }"#;
        let request = signed_request(body, now());
        let signature = request.headers().get(SIGNATURE_HEADER).unwrap().clone();

        let response = app(routes).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_bytes(response).await.is_empty());

        for rx in [&mut rx_a, &mut rx_b] {
            let received = timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&received.body[..], body.as_bytes());
            assert_eq!(received.headers.get(SIGNATURE_HEADER).unwrap(), &signature);
        }
    }

    #[tokio::test]
    async fn test_callback_without_subscribers_is_acknowledged() {
        let (addr, mut rx) = downstream(StatusCode::OK).await;
        let routes = RouteTable::from_entries([("message", vec![hook_url(addr)])]).unwrap();

        let response = app(routes)
            .oneshot(signed_request(
                r#"{"type":"event_callback","event":{"type":"app_mention"}}"#,
                now(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_callback_with_failing_destination_still_acknowledged() {
        let (a, mut rx_a) = downstream(StatusCode::OK).await;
        let (c, mut rx_c) = downstream(StatusCode::OK).await;
        let routes = RouteTable::from_entries([(
            "app_mention",
            vec![hook_url(a), hook_url(refused_addr()), hook_url(c)],
        )])
        .unwrap();

        let body = r#"{"type":"event_callback","event":{"type":"app_mention","text":"<@U1>"}}"#;
        let response = app(routes)
            .oneshot(signed_request(body, now()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for rx in [&mut rx_a, &mut rx_c] {
            let received = timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&received.body[..], body.as_bytes());
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            auth_status(&AuthError::MissingHeader("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            auth_status(&AuthError::Malformed("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(auth_status(&AuthError::Mismatch), StatusCode::UNAUTHORIZED);
        assert_eq!(
            parse_status(&ParseError::MissingField {
                envelope: "event_callback",
                field: "event"
            }),
            StatusCode::OK
        );
    }
}
