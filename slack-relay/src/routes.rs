//! Route table: event subtype to ordered destination URLs.
//!
//! Loaded once at startup and validated eagerly, so a bad URL fails the
//! process before it accepts traffic rather than at dispatch time.

use std::collections::HashMap;

use tracing::info;
use url::Url;

use crate::error::ConfigError;
use crate::event::EventKind;

/// Immutable mapping from event subtype to destinations.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<EventKind, Vec<Url>>,
}

impl RouteTable {
    /// Build a table from `(subtype, urls)` pairs.
    ///
    /// Repeated subtypes append to the earlier entry, preserving order.
    pub fn from_entries<I, S, U>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, Vec<U>)>,
        S: AsRef<str>,
        U: AsRef<str>,
    {
        let mut routes: HashMap<EventKind, Vec<Url>> = HashMap::new();

        for (subtype, urls) in entries {
            let subtype = subtype.as_ref().trim();
            let kind = EventKind::from_tag(subtype);
            if !kind.is_routable() {
                return Err(ConfigError::UnknownSubtype(subtype.to_string()));
            }

            let destinations = routes.entry(kind).or_default();
            for raw in urls {
                destinations.push(parse_destination(subtype, raw.as_ref().trim())?);
            }
        }

        Ok(Self { routes })
    }

    /// Parse the inline syntax `message=http://a,http://b;app_mention=http://c`.
    pub fn parse_spec(spec: &str) -> Result<Self, ConfigError> {
        let mut entries = Vec::new();

        for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (subtype, urls) = entry.split_once('=').ok_or_else(|| {
                ConfigError::InvalidRouteSpec {
                    entry: entry.to_string(),
                    reason: "expected `subtype=url[,url...]`".to_string(),
                }
            })?;

            if subtype.trim().is_empty() {
                return Err(ConfigError::InvalidRouteSpec {
                    entry: entry.to_string(),
                    reason: "empty subtype".to_string(),
                });
            }

            let urls: Vec<&str> = urls
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .collect();
            entries.push((subtype, urls));
        }

        Self::from_entries(entries)
    }

    /// Parse a JSON object of the form `{"message": ["http://..."]}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let entries: HashMap<String, Vec<String>> =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidRouteSpec {
                entry: "<json>".to_string(),
                reason: e.to_string(),
            })?;
        Self::from_entries(entries)
    }

    /// Destinations subscribed to `kind`; empty when there are none.
    pub fn destinations_for(&self, kind: &EventKind) -> &[Url] {
        self.routes.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.routes.values().all(Vec::is_empty)
    }

    /// Total number of configured destinations across all subtypes.
    pub fn destination_count(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    /// Log the loaded routes, one line per subtype.
    pub fn log_summary(&self) {
        for (kind, urls) in &self.routes {
            let urls: Vec<&str> = urls.iter().map(Url::as_str).collect();
            info!(subtype = %kind, destinations = ?urls, "route_loaded");
        }
    }
}

fn parse_destination(subtype: &str, raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidDestination {
        subtype: subtype.to_string(),
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme `{}`", other))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}
