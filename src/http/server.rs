//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the single dispatch handler
//! - Wire up middleware (request ID, tracing)
//! - Tag client-supplied request IDs before one is generated
//! - Serve on a plain TCP listener or through axum-server's rustls acceptor
//! - Classify each request and hand it to the HTTP or WebSocket relay

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware,
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::forward::HttpRelay;
use crate::http::request::mark_client_request_id;
use crate::http::websocket::WebSocketRelay;
use crate::lifecycle::ShutdownSignal;
use crate::routing::{classify, RequestKind, UpstreamTarget};

/// How long in-flight TLS connections may drain after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub http: HttpRelay,
    pub websocket: WebSocketRelay,
}

/// HTTP server for the relay.
pub struct HttpServer {
    config: ProxyConfig,
    target: Arc<UpstreamTarget>,
    http: HttpRelay,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, reqwest::Error> {
        let target = Arc::new(UpstreamTarget::from_config(&config.upstream));
        let http = HttpRelay::new(target.clone(), &config.timeouts)?;
        Ok(Self { config, target, http })
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self, shutdown: ShutdownSignal) -> Router {
        let state = AppState {
            http: self.http.clone(),
            websocket: WebSocketRelay::new(self.target.clone(), &self.config.websocket, shutdown),
        };

        Router::new()
            .route("/", any(dispatch))
            .route("/{*path}", any(dispatch))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(middleware::map_request(mark_client_request_id))
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.target.host(),
            "HTTP server starting"
        );

        let app = self
            .router(shutdown.clone())
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut stop = shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server behind TLS. Certificates are handled entirely by rustls.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            address = %addr,
            upstream = %self.target.host(),
            "HTTPS server starting"
        );

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        let mut stop = shutdown.clone();
        tokio::spawn(async move {
            stop.recv().await;
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        let app = self
            .router(shutdown)
            .into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Single entry point for every request: classify, then relay.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let kind = classify(request.headers());
    tracing::debug!(
        peer = %peer,
        method = %request.method(),
        path = %request.uri().path(),
        kind = ?kind,
        "Dispatching request"
    );

    match kind {
        RequestKind::WebSocket => state.websocket.handle(request).await,
        RequestKind::Http => state.http.handle(request).await,
    }
}
