//! End-to-end tests for plain HTTP relaying.

mod common;

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::stream;
use tokio::sync::Notify;

use common::{closed_port, raw_client, start_http_upstream, start_proxy, start_recording_upstream};

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[tokio::test]
async fn compressed_upstream_body_reaches_client_decoded() {
    let app = Router::new().route(
        "/api/data",
        get(|| async {
            (
                [
                    (header::CONTENT_TYPE, "application/json"),
                    (header::CONTENT_ENCODING, "gzip"),
                ],
                gzip(br#"{"ok":true}"#),
            )
        }),
    );
    let upstream = start_http_upstream(app).await;
    let proxy = start_proxy(upstream, |_| {}).await;

    let response = raw_client()
        .get(proxy.url("/api/data?x=1"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, PUT, DELETE, OPTIONS");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(response.text().await.unwrap(), r#"{"ok":true}"#);
}

#[tokio::test]
async fn path_and_query_pass_through_verbatim() {
    let (upstream, mut recorded) = start_recording_upstream().await;
    let proxy = start_proxy(upstream, |_| {}).await;

    let response = raw_client()
        .get(proxy.url("/v1/items/42?sort=desc&tag=a%20b"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let seen = recorded.recv().await.unwrap();
    assert_eq!(seen.method, "GET");
    assert_eq!(seen.uri.path(), "/v1/items/42");
    assert_eq!(seen.uri.query(), Some("sort=desc&tag=a%20b"));
}

#[tokio::test]
async fn connection_scoped_headers_are_not_forwarded() {
    let (upstream, mut recorded) = start_recording_upstream().await;
    let proxy = start_proxy(upstream, |_| {}).await;

    raw_client()
        .post(proxy.url("/submit"))
        .header("keep-alive", "timeout=5")
        .header("proxy-connection", "keep-alive")
        .header("x-custom", "yes")
        .body("payload")
        .send()
        .await
        .unwrap();

    let seen = recorded.recv().await.unwrap();
    assert!(seen.headers.get("keep-alive").is_none());
    assert!(seen.headers.get("proxy-connection").is_none());
    assert!(seen.headers.get(header::UPGRADE).is_none());
    assert_eq!(seen.headers["x-custom"], "yes");
    assert_eq!(seen.headers[header::HOST], upstream.to_string().as_str());
}

#[tokio::test]
async fn post_body_is_forwarded() {
    let (upstream, mut recorded) = start_recording_upstream().await;
    let proxy = start_proxy(upstream, |_| {}).await;

    let response = raw_client()
        .post(proxy.url("/submit"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(r#"{"name":"relay"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "recorded");

    let seen = recorded.recv().await.unwrap();
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.body, Bytes::from_static(br#"{"name":"relay"}"#));
    assert_eq!(seen.headers[header::CONTENT_TYPE], "application/json");
}

#[tokio::test]
async fn get_body_is_never_forwarded() {
    let (upstream, mut recorded) = start_recording_upstream().await;
    let proxy = start_proxy(upstream, |_| {}).await;

    raw_client()
        .get(proxy.url("/search"))
        .body("ignored")
        .send()
        .await
        .unwrap();

    let seen = recorded.recv().await.unwrap();
    assert_eq!(seen.method, "GET");
    assert!(seen.body.is_empty());
}

#[tokio::test]
async fn bodyless_requests_go_upstream_without_a_body() {
    let (upstream, mut recorded) = start_recording_upstream().await;
    let proxy = start_proxy(upstream, |_| {}).await;

    for method in [Method::DELETE, Method::OPTIONS] {
        let response = raw_client()
            .request(method.clone(), proxy.url("/items/7"))
            .header(header::ORIGIN, "https://app.example.com")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let seen = recorded.recv().await.unwrap();
        assert_eq!(seen.method, method);
        assert!(seen.headers.get(header::TRANSFER_ENCODING).is_none(), "{method} sent chunked");
        assert!(seen.body.is_empty());
    }
}

#[tokio::test]
async fn upstream_sees_exactly_the_client_headers() {
    let (upstream, mut recorded) = start_recording_upstream().await;
    let proxy = start_proxy(upstream, |_| {}).await;

    let response = raw_client()
        .get(proxy.url("/profile"))
        .header(header::ACCEPT, "application/json")
        .header(header::ACCEPT_ENCODING, "identity")
        .header("x-custom", "yes")
        .header("keep-alive", "timeout=5")
        .send()
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    let seen = recorded.recv().await.unwrap();
    let names: BTreeSet<&str> = seen.headers.keys().map(|name| name.as_str()).collect();
    assert_eq!(
        names,
        BTreeSet::from(["accept", "accept-encoding", "host", "x-custom"])
    );
    assert_eq!(seen.headers[header::HOST], upstream.to_string().as_str());
    assert_eq!(seen.headers[header::ACCEPT], "application/json");
}

#[tokio::test]
async fn client_request_id_reaches_upstream() {
    let (upstream, mut recorded) = start_recording_upstream().await;
    let proxy = start_proxy(upstream, |_| {}).await;

    raw_client()
        .get(proxy.url("/"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();

    let seen = recorded.recv().await.unwrap();
    assert_eq!(seen.headers["x-request-id"], "trace-me");
}

#[tokio::test]
async fn redirects_are_returned_not_followed() {
    let app = Router::new()
        .route(
            "/old",
            get(|| async {
                let mut response = StatusCode::FOUND.into_response();
                response
                    .headers_mut()
                    .insert(header::LOCATION, HeaderValue::from_static("/new"));
                response
            }),
        )
        .route("/new", get(|| async { "followed" }));
    let upstream = start_http_upstream(app).await;
    let proxy = start_proxy(upstream, |_| {}).await;

    let response = raw_client().get(proxy.url("/old")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/new");
}

#[tokio::test]
async fn response_body_streams_before_upstream_finishes() {
    let release = Arc::new(Notify::new());
    let app = {
        let release = release.clone();
        Router::new().route(
            "/stream",
            get(move || {
                let release = release.clone();
                async move {
                    let chunks = stream::unfold(0u8, move |step| {
                        let release = release.clone();
                        async move {
                            match step {
                                0 => Some((Ok::<_, Infallible>(Bytes::from_static(b"first;")), 1)),
                                1 => {
                                    release.notified().await;
                                    Some((Ok(Bytes::from_static(b"second")), 2))
                                }
                                _ => None,
                            }
                        }
                    });
                    Response::new(Body::from_stream(chunks))
                }
            }),
        )
    };
    let upstream = start_http_upstream(app).await;
    let proxy = start_proxy(upstream, |_| {}).await;

    let mut response = raw_client().get(proxy.url("/stream")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let first = tokio::time::timeout(Duration::from_secs(2), response.chunk())
        .await
        .expect("first chunk should arrive while upstream is still open")
        .unwrap()
        .unwrap();
    assert_eq!(first, Bytes::from_static(b"first;"));

    release.notify_one();
    let mut rest = Vec::new();
    while let Some(chunk) = response.chunk().await.unwrap() {
        rest.extend_from_slice(&chunk);
    }
    assert_eq!(rest, b"second");
}

#[tokio::test]
async fn unreachable_upstream_yields_bad_gateway() {
    let upstream = closed_port().await;
    let proxy = start_proxy(upstream, |_| {}).await;

    let response = raw_client().get(proxy.url("/anything")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Proxy Error");
    assert!(!body["details"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn slow_upstream_hits_response_timeout() {
    let app = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "late"
        }),
    );
    let upstream = start_http_upstream(app).await;
    let proxy = start_proxy(upstream, |config| {
        config.timeouts.response_secs = Some(1);
    })
    .await;

    let response = raw_client().get(proxy.url("/slow")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Proxy Error");
}

#[tokio::test]
async fn responses_carry_request_id() {
    let (upstream, _recorded) = start_recording_upstream().await;
    let proxy = start_proxy(upstream, |_| {}).await;

    let response = raw_client().get(proxy.url("/")).send().await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    let response = raw_client()
        .get(proxy.url("/"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn upgrade_header_without_handshake_is_rejected() {
    let (upstream, _recorded) = start_recording_upstream().await;
    let proxy = start_proxy(upstream, |_| {}).await;

    let response = raw_client()
        .get(proxy.url("/live"))
        .header(header::UPGRADE, "websocket")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "WebSocket Error");
}
