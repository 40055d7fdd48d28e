//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, Uri};
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use relay_proxy::config::ProxyConfig;
use relay_proxy::http::HttpServer;
use relay_proxy::lifecycle::Shutdown;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// A running relay in front of a mock upstream.
pub struct Proxy {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl Proxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the relay pointed at `upstream` over plain http/ws.
pub async fn start_proxy(upstream: SocketAddr, tweak: impl FnOnce(&mut ProxyConfig)) -> Proxy {
    let mut config = ProxyConfig::default();
    config.upstream.host = upstream.to_string();
    config.upstream.tls = false;
    config.timeouts.connect_secs = 2;
    tweak(&mut config);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let signal = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });

    Proxy { addr, shutdown }
}

/// Serve an axum router as the mock upstream on an ephemeral port.
pub async fn start_http_upstream(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// What the mock upstream saw.
#[derive(Debug)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Upstream that records every request and answers `200 recorded`.
pub async fn start_recording_upstream() -> (SocketAddr, mpsc::UnboundedReceiver<Recorded>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new().fallback(move |request: Request<Body>| {
        let tx = tx.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
            let _ = tx.send(Recorded {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            });
            "recorded"
        }
    });
    (start_http_upstream(app).await, rx)
}

/// HTTP client that shows the relay's raw output: no redirects, no decoding, no pooling.
pub fn raw_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_gzip()
        .no_brotli()
        .no_deflate()
        .no_zstd()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Something the mock WebSocket upstream observed.
#[derive(Debug, PartialEq)]
pub enum WsEvent {
    Message(Message),
    Closed,
}

/// Mock WebSocket upstream serving a single connection.
pub struct WsUpstream {
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<WsEvent>,
    commands: mpsc::UnboundedSender<Message>,
}

impl WsUpstream {
    /// Send a message from the upstream to the relay. `Message::Close` closes the socket.
    pub fn send(&self, message: Message) {
        self.commands.send(message).unwrap();
    }

    pub async fn next_event(&mut self) -> WsEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for upstream event")
            .expect("upstream task ended")
    }
}

/// Start a WebSocket upstream that completes its handshake `open_delay` after the TCP accept.
pub async fn start_ws_upstream(open_delay: Duration) -> WsUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (events_tx, events) = mpsc::unbounded_channel();
    let (commands, mut commands_rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else { return };
        tokio::time::sleep(open_delay).await;
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
            let _ = events_tx.send(WsEvent::Closed);
            return;
        };

        loop {
            tokio::select! {
                received = ws.next() => match received {
                    Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                        let _ = events_tx.send(WsEvent::Message(message));
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        let _ = events_tx.send(WsEvent::Closed);
                        break;
                    }
                    Some(Ok(_)) => {}
                },
                command = commands_rx.recv() => match command {
                    Some(Message::Close(frame)) => {
                        let _ = ws.close(frame).await;
                    }
                    Some(message) => {
                        let _ = ws.send(message).await;
                    }
                    None => break,
                },
            }
        }
    });

    WsUpstream { addr, events, commands }
}
