//! Response handling and transformation.
//!
//! # Responsibilities
//! - Transform upstream response headers for the client
//! - Inject permissive CORS headers
//! - Map relay failures to the client-visible error shapes
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Encoding headers are dropped because the body is relayed decoded
//! - Upstream failures are 502 with a JSON body; upgrade failures are 500 plain text

use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Response headers never passed back to the client.
pub static STRIPPED_RESPONSE_HEADERS: [header::HeaderName; 2] =
    [header::CONTENT_ENCODING, header::TRANSFER_ENCODING];

pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// Rewrite upstream response headers in place.
pub fn rewrite_response_headers(headers: &mut HeaderMap) {
    for name in STRIPPED_RESPONSE_HEADERS.iter() {
        headers.remove(name);
    }
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
}

/// Failure of a single HTTP forward.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("{}", error_chain(.0))]
    Upstream(#[from] reqwest::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

/// Display an error followed by its sources, `outer: inner: root`.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// JSON body of a 502 response.
#[derive(Debug, Serialize)]
pub struct ProxyErrorBody {
    pub error: &'static str,
    pub details: String,
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        let body = ProxyErrorBody {
            error: "Proxy Error",
            details: self.to_string(),
        };
        (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
}

/// The client-side WebSocket upgrade could not be completed.
pub fn websocket_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "WebSocket Error").into_response()
}

/// The admission gate has no room for another session.
pub fn sessions_exhausted() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "Too many WebSocket sessions").into_response()
}
