//! The fixed upstream every request is relayed to.

use axum::http::{HeaderValue, Uri};

use crate::config::UpstreamConfig;

/// Immutable upstream host plus its scheme pair.
///
/// Built once at startup and shared read-only by every request and session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    host: String,
    secure: bool,
}

impl UpstreamTarget {
    pub fn new(host: impl Into<String>, secure: bool) -> Self {
        Self {
            host: host.into().trim().to_string(),
            secure,
        }
    }

    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self::new(config.host.clone(), config.tls)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Value for the `Host` header of forwarded requests.
    pub fn host_header(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.host).ok()
    }

    pub fn http_scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }

    pub fn ws_scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// Upstream HTTP URL for an inbound URI. Path and query pass through verbatim.
    pub fn http_url(&self, uri: &Uri) -> String {
        format!("{}://{}{}", self.http_scheme(), self.host, path_and_query(uri))
    }

    /// Upstream WebSocket URL for an inbound URI, independent of the inbound scheme.
    pub fn ws_url(&self, uri: &Uri) -> String {
        format!("{}://{}{}", self.ws_scheme(), self.host, path_and_query(uri))
    }
}

fn path_and_query(uri: &Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}
