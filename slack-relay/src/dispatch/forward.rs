//! Single-destination delivery.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::HeaderMap;
use reqwest::Client;
use tracing;
use url::Url;

use crate::error::DispatchError;

/// Headers describing the inbound connection rather than the payload.
///
/// Everything else, including Slack's signature headers, is forwarded as-is.
const HOP_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "proxy-connection",
    "upgrade",
    "te",
    "trailer",
];

/// Copy `original` minus connection-specific headers.
pub fn forwarded_headers(original: &HeaderMap) -> HeaderMap {
    let mut headers = original.clone();
    for name in HOP_HEADERS {
        headers.remove(*name);
    }
    headers
}

/// POST `body` to `destination` once.
///
/// Returns the response status on 2xx, otherwise the reason for failure.
pub async fn forward_once(
    client: &Client,
    destination: &Url,
    headers: HeaderMap,
    body: Bytes,
    timeout: Duration,
) -> Result<u16, DispatchError> {
    tracing::debug!(
        destination = %destination,
        body_length = body.len(),
        timeout_ms = timeout.as_millis() as u64,
        "forward_starting"
    );

    let result = client
        .post(destination.clone())
        .headers(headers)
        .body(body)
        .timeout(timeout)
        .send()
        .await;

    match result {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if resp.status().is_success() {
                tracing::info!(destination = %destination, status_code = status, "forward_complete");
                Ok(status)
            } else {
                tracing::warn!(destination = %destination, status_code = status, "forward_rejected");
                Err(DispatchError::Status(status))
            }
        }
        Err(e) => {
            let error = if e.is_timeout() {
                DispatchError::Timeout(timeout.as_millis() as u64)
            } else if e.is_connect() {
                DispatchError::Connect(e.to_string())
            } else {
                DispatchError::Request(e.to_string())
            };
            tracing::error!(destination = %destination, error = %error, "forward_failed");
            Err(error)
        }
    }
}
