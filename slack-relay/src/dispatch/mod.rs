//! Fan-out of callback events to subscribed destinations.
//!
//! ## Delivery Policy
//!
//! - One POST per destination, all destinations in parallel
//! - Body forwarded byte-for-byte, inbound headers copied
//! - Each attempt has its own timeout
//! - Failures are logged and recorded, never retried or propagated

pub mod forward;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::HeaderMap;
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

use crate::error::DispatchError;
use crate::event::EventKind;
use crate::routes::RouteTable;

pub use forward::{forward_once, forwarded_headers};

/// Result of one delivery attempt.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub destination: Url,
    /// Response status on success.
    pub result: Result<u16, DispatchError>,
}

/// Per-event summary. Only ever logged.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub kind: EventKind,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

/// Forwards events to the destinations listed in the route table.
///
/// Cloning is cheap; the client and table are shared.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    routes: Arc<RouteTable>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(client: Client, routes: Arc<RouteTable>, timeout: Duration) -> Self {
        Self {
            client,
            routes,
            timeout,
        }
    }

    /// Deliver `raw_body` to every destination subscribed to `kind`.
    pub async fn dispatch(
        &self,
        kind: &EventKind,
        original_headers: &HeaderMap,
        raw_body: Bytes,
    ) -> DispatchReport {
        let destinations = self.routes.destinations_for(kind);

        if destinations.is_empty() {
            info!(subtype = %kind, "dispatch_no_subscribers");
            return DispatchReport {
                kind: kind.clone(),
                outcomes: Vec::new(),
            };
        }

        let headers = forwarded_headers(original_headers);

        let futures: Vec<_> = destinations
            .iter()
            .map(|destination| {
                let headers = headers.clone();
                let body = raw_body.clone();
                async move {
                    let result =
                        forward_once(&self.client, destination, headers, body, self.timeout).await;
                    DeliveryOutcome {
                        destination: destination.clone(),
                        result,
                    }
                }
            })
            .collect();

        let outcomes = futures::future::join_all(futures).await;
        let report = DispatchReport {
            kind: kind.clone(),
            outcomes,
        };

        if report.failed() > 0 {
            let failures: Vec<String> = report
                .outcomes
                .iter()
                .filter_map(|o| {
                    o.result
                        .as_ref()
                        .err()
                        .map(|e| format!("{}: {}", o.destination, e))
                })
                .collect();
            warn!(
                subtype = %kind,
                destinations = report.outcomes.len(),
                delivered = report.delivered(),
                failed = report.failed(),
                failures = ?failures,
                "dispatch_partial_failure"
            );
        } else {
            info!(
                subtype = %kind,
                destinations = report.outcomes.len(),
                delivered = report.delivered(),
                "dispatch_complete"
            );
        }

        report
    }

    /// Run `dispatch` on a detached task so the caller can acknowledge now.
    pub fn spawn(
        &self,
        kind: EventKind,
        original_headers: HeaderMap,
        raw_body: Bytes,
    ) -> JoinHandle<DispatchReport> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher
                .dispatch(&kind, &original_headers, raw_body)
                .await
        })
    }
}
