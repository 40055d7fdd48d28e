//! Request handling and transformation.
//!
//! # Responsibilities
//! - Strip connection-scoped headers before forwarding
//! - Point the `Host` header at the upstream
//! - Decide whether the inbound body travels upstream
//! - Keep locally generated request IDs out of the forwarded headers
//!
//! # Design Decisions
//! - The strip-list is fixed and matched case-insensitively (`HeaderName` is lowercase)
//! - Multi-valued headers keep every value
//! - Original request preserved for logging; modified copy forwarded

use axum::body::{Body, HttpBody};
use axum::http::{header, Extensions, HeaderMap, HeaderName, HeaderValue, Method, Request};

/// Request headers never copied to the upstream.
pub static STRIPPED_REQUEST_HEADERS: [HeaderName; 6] = [
    header::HOST,
    header::CONNECTION,
    header::UPGRADE,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::CONTENT_LENGTH,
];

fn is_stripped(name: &HeaderName) -> bool {
    STRIPPED_REQUEST_HEADERS.contains(name)
}

/// Build the header set sent upstream.
pub fn outbound_headers(inbound: &HeaderMap, upstream_host: Option<HeaderValue>) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 1);
    for (name, value) in inbound.iter() {
        if !is_stripped(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    if let Some(host) = upstream_host {
        headers.insert(header::HOST, host);
    }
    headers
}

/// GET and HEAD never carry a body upstream, even if the client sent one.
pub fn forwards_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

/// True when the inbound body has content to forward.
///
/// A request without `Content-Length` or `Transfer-Encoding` arrives already
/// at end of stream and goes upstream without a body.
pub fn has_body(body: &Body) -> bool {
    !body.is_end_stream()
}

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Marks a request whose client sent its own `x-request-id`.
#[derive(Debug, Clone, Copy)]
pub struct ClientRequestId;

/// Runs ahead of request-ID generation and records whether the client supplied one.
pub async fn mark_client_request_id(mut request: Request<Body>) -> Request<Body> {
    if request.headers().contains_key(&X_REQUEST_ID) {
        request.extensions_mut().insert(ClientRequestId);
    }
    request
}

/// Drop a request ID the relay generated itself; client-supplied IDs travel on.
pub fn strip_generated_request_id(headers: &mut HeaderMap, extensions: &Extensions) {
    if extensions.get::<ClientRequestId>().is_none() {
        headers.remove(&X_REQUEST_ID);
    }
}
