//! WebSocket proxy handling.
//!
//! # Responsibilities
//! - Complete upgrade handshake with client
//! - Admit the session against the concurrent session limit
//! - Establish WebSocket connection to the upstream
//! - Bidirectional message forwarding
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Upstream
//! ```
//!
//! # Design Decisions
//! - WebSocket handled separately from HTTP request/response
//! - Messages sent before the upstream opens are buffered (bounded, FIFO)
//! - Close on either side closes the other
//! - Ping/pong answered locally on each side, not forwarded

pub mod message;
pub mod queue;
pub mod session;

use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::FromRequestParts;
use axum::http::Request;
use axum::response::Response;

use crate::config::WebSocketConfig;
use crate::http::response;
use crate::lifecycle::ShutdownSignal;
use crate::net::admission::SessionGate;
use crate::routing::UpstreamTarget;

pub use session::{CloseReason, Session, SessionSettings, SessionState};

/// Accepts WebSocket upgrades and spawns one [`Session`] per client.
#[derive(Clone)]
pub struct WebSocketRelay {
    target: Arc<UpstreamTarget>,
    settings: SessionSettings,
    gate: SessionGate,
    shutdown: ShutdownSignal,
}

impl WebSocketRelay {
    pub fn new(target: Arc<UpstreamTarget>, config: &WebSocketConfig, shutdown: ShutdownSignal) -> Self {
        Self {
            target,
            settings: SessionSettings::from(config),
            gate: SessionGate::new(config.max_sessions),
            shutdown,
        }
    }

    /// Upgrade the client connection and hand it to a new session.
    ///
    /// The request body is discarded; the upstream is only dialed once the
    /// client handshake has succeeded.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let (mut parts, _body) = request.into_parts();

        let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
            Ok(upgrade) => upgrade,
            Err(rejection) => {
                tracing::warn!(
                    path = %parts.uri.path(),
                    error = %rejection.body_text(),
                    "WebSocket upgrade rejected"
                );
                return response::websocket_error();
            }
        };

        let Some(permit) = self.gate.try_admit() else {
            tracing::warn!(
                path = %parts.uri.path(),
                max_sessions = self.gate.max_sessions(),
                "WebSocket session limit reached"
            );
            return response::sessions_exhausted();
        };

        let upstream_url = self.target.ws_url(&parts.uri);
        tracing::info!(
            session_id = %permit.id(),
            path = %parts.uri.path(),
            upstream = %upstream_url,
            "Proxying WebSocket"
        );

        let session = Session::new(permit, upstream_url, self.settings.clone(), self.shutdown.clone());
        upgrade
            .on_failed_upgrade(|e| {
                tracing::warn!(error = %e, "WebSocket handshake with client failed");
            })
            .on_upgrade(move |socket| async move {
                session.run(socket).await;
            })
    }
}
