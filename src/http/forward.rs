//! HTTP relay: one inbound request, one upstream request, one streamed response.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};

use crate::config::TimeoutConfig;
use crate::http::request::{
    forwards_body, has_body, outbound_headers, strip_generated_request_id,
};
use crate::http::response::{rewrite_response_headers, ForwardError};
use crate::observability::metrics;
use crate::routing::UpstreamTarget;

/// Forwards plain HTTP requests to the upstream target.
#[derive(Clone)]
pub struct HttpRelay {
    client: reqwest::Client,
    target: Arc<UpstreamTarget>,
    response_timeout: Option<Duration>,
}

impl HttpRelay {
    /// Build the relay and its upstream client.
    ///
    /// Redirects are never followed; the client sees them as the upstream sent them.
    pub fn new(target: Arc<UpstreamTarget>, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(timeouts.connect())
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            target,
            response_timeout: timeouts.response(),
        })
    }

    /// Forward a request, mapping any upstream failure to a 502.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let response = match self.forward(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(method = %method, path = %path, error = %e, "Upstream request failed");
                e.into_response()
            }
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        response
    }

    /// Issue the upstream request and stream its response back.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let url = self.target.http_url(&parts.uri);
        let mut headers = outbound_headers(&parts.headers, self.target.host_header());
        strip_generated_request_id(&mut headers, &parts.extensions);

        tracing::debug!(method = %parts.method, url = %url, "Forwarding request");

        let mut upstream_request = self
            .client
            .request(parts.method.clone(), url.as_str())
            .headers(headers);
        if forwards_body(&parts.method) && has_body(&body) {
            upstream_request =
                upstream_request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let sent = upstream_request.send();
        let upstream = match self.response_timeout {
            Some(limit) => tokio::time::timeout(limit, sent)
                .await
                .map_err(|_| ForwardError::Timeout(limit))??,
            None => sent.await?,
        };

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        rewrite_response_headers(&mut headers);

        tracing::debug!(url = %url, status = %status, "Upstream responded");

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
