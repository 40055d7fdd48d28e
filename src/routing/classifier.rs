//! Request classification: WebSocket upgrade vs. plain HTTP.

use axum::http::{header, HeaderMap};

/// Which relay owns an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Http,
    WebSocket,
}

/// True when the request asks to switch to the WebSocket protocol.
///
/// Only the `Upgrade` header is inspected; the body is left untouched.
pub fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

pub fn classify(headers: &HeaderMap) -> RequestKind {
    if is_websocket_upgrade(headers) {
        RequestKind::WebSocket
    } else {
        RequestKind::Http
    }
}
