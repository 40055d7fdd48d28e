//! One client ↔ upstream WebSocket pairing.
//!
//! A session is a single task that owns both connections:
//!
//! ```text
//! Handshaking ──▶ ConnectingUpstream ──▶ Relaying ──▶ Closed
//!                   │ (client messages        │
//!                   │  queued, FIFO)          │ client→upstream pump
//!                   └──────── Closed ◀────────┤ upstream→client pump
//!                                             └ shutdown signal
//! ```
//!
//! Whichever pump finishes first ends the session; the other is dropped and
//! both connections are closed. Close errors are ignored.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use axum::extract::ws::{Message as ClientMessage, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::error::Elapsed;
use tokio_tungstenite::tungstenite::{Error as UpstreamError, Message as UpstreamMessage};

use crate::config::{OverflowPolicy, WebSocketConfig};
use crate::http::websocket::message::{from_client, from_upstream, Relayed};
use crate::http::websocket::queue::{Enqueued, PendingQueue};
use crate::lifecycle::ShutdownSignal;
use crate::net::admission::{SessionId, SessionPermit};
use crate::observability::metrics;

/// Upper bound on how long closing one side may take.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Per-session tunables, copied from [`WebSocketConfig`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub connect_timeout: Duration,
    pub max_pending: usize,
    pub overflow_policy: OverflowPolicy,
}

impl From<&WebSocketConfig> for SessionSettings {
    fn from(config: &WebSocketConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            max_pending: config.max_pending_messages,
            overflow_policy: config.overflow_policy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    ConnectingUpstream,
    Relaying,
    Closed,
}

/// Why a session reached [`SessionState::Closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientClosed,
    ClientError,
    UpstreamClosed,
    UpstreamError,
    ConnectFailed,
    ConnectTimeout,
    QueueOverflow,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientClosed => "client_closed",
            CloseReason::ClientError => "client_error",
            CloseReason::UpstreamClosed => "upstream_closed",
            CloseReason::UpstreamError => "upstream_error",
            CloseReason::ConnectFailed => "connect_failed",
            CloseReason::ConnectTimeout => "connect_timeout",
            CloseReason::QueueOverflow => "queue_overflow",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a relay pump; decides how each way of ending is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ToUpstream,
    ToClient,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::ToUpstream => "client_to_upstream",
            Direction::ToClient => "upstream_to_client",
        }
    }

    fn source_ended(self) -> CloseReason {
        match self {
            Direction::ToUpstream => CloseReason::ClientClosed,
            Direction::ToClient => CloseReason::UpstreamClosed,
        }
    }

    fn source_failed(self) -> CloseReason {
        match self {
            Direction::ToUpstream => CloseReason::ClientError,
            Direction::ToClient => CloseReason::UpstreamError,
        }
    }

    fn sink_failed(self) -> CloseReason {
        match self {
            Direction::ToUpstream => CloseReason::UpstreamClosed,
            Direction::ToClient => CloseReason::ClientClosed,
        }
    }
}

enum Connecting<U, E> {
    Shutdown,
    Opened(Result<Result<U, UpstreamError>, Elapsed>),
    Client(Option<Result<ClientMessage, E>>),
}

pub struct Session {
    permit: SessionPermit,
    upstream_url: String,
    settings: SessionSettings,
    state: SessionState,
    pending: PendingQueue<UpstreamMessage>,
    shutdown: ShutdownSignal,
}

impl Session {
    pub fn new(
        permit: SessionPermit,
        upstream_url: String,
        settings: SessionSettings,
        shutdown: ShutdownSignal,
    ) -> Self {
        let pending = PendingQueue::new(settings.max_pending, settings.overflow_policy);
        Self {
            permit,
            upstream_url,
            settings,
            state: SessionState::Handshaking,
            pending,
            shutdown,
        }
    }

    pub fn id(&self) -> SessionId {
        self.permit.id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn upstream_url(&self) -> &str {
        &self.upstream_url
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(session_id = %self.id(), from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }

    /// Drive the session until either side closes. Consumes the client socket.
    pub async fn run(mut self, client: WebSocket) -> CloseReason {
        let (mut client_tx, mut client_rx) = client.split();
        self.transition(SessionState::ConnectingUpstream);

        let url = self.upstream_url.clone();
        let connect = async move {
            tokio_tungstenite::connect_async(url)
                .await
                .map(|(socket, _response)| socket)
        };

        let mut upstream_tx = None;
        let reason = match self.connect_upstream(&mut client_rx, connect).await {
            Err(reason) => reason,
            Ok(upstream) => {
                tracing::debug!(session_id = %self.id(), url = %self.upstream_url, "Upstream WebSocket open");
                let (mut tx, mut rx) = upstream.split();
                let reason = match self.flush_pending(&mut tx).await {
                    Err(reason) => reason,
                    Ok(()) => {
                        self.transition(SessionState::Relaying);
                        self.relay(&mut client_rx, &mut client_tx, &mut rx, &mut tx).await
                    }
                };
                upstream_tx = Some(tx);
                reason
            }
        };

        self.transition(SessionState::Closed);
        close_quietly::<_, ClientMessage>(&mut client_tx).await;
        if let Some(mut tx) = upstream_tx {
            close_quietly::<_, UpstreamMessage>(&mut tx).await;
        }

        tracing::info!(session_id = %self.id(), reason = %reason, "WebSocket session closed");
        metrics::session_closed(reason.as_str());
        reason
    }

    /// Wait for the upstream to open, queueing client messages meanwhile.
    async fn connect_upstream<C, E, F, U>(
        &mut self,
        client_rx: &mut C,
        connect: F,
    ) -> Result<U, CloseReason>
    where
        C: Stream<Item = Result<ClientMessage, E>> + Unpin,
        E: Display,
        F: Future<Output = Result<U, UpstreamError>>,
    {
        let connect = tokio::time::timeout(self.settings.connect_timeout, connect);
        tokio::pin!(connect);

        loop {
            let event = tokio::select! {
                _ = self.shutdown.recv() => Connecting::Shutdown,
                opened = &mut connect => Connecting::Opened(opened),
                received = client_rx.next() => Connecting::Client(received),
            };

            match event {
                Connecting::Shutdown => return Err(CloseReason::Shutdown),
                Connecting::Opened(Ok(Ok(upstream))) => return Ok(upstream),
                Connecting::Opened(Ok(Err(e))) => {
                    tracing::warn!(session_id = %self.id(), url = %self.upstream_url, error = %e, "Upstream WebSocket connect failed");
                    return Err(CloseReason::ConnectFailed);
                }
                Connecting::Opened(Err(_)) => {
                    tracing::warn!(
                        session_id = %self.id(),
                        url = %self.upstream_url,
                        timeout = ?self.settings.connect_timeout,
                        "Upstream WebSocket connect timed out"
                    );
                    return Err(CloseReason::ConnectTimeout);
                }
                Connecting::Client(None) => return Err(CloseReason::ClientClosed),
                Connecting::Client(Some(Err(e))) => {
                    tracing::debug!(session_id = %self.id(), error = %e, "Client WebSocket error while connecting");
                    return Err(CloseReason::ClientError);
                }
                Connecting::Client(Some(Ok(message))) => match from_client(message) {
                    Relayed::Forward(message) => self.enqueue(message)?,
                    Relayed::Skip => {}
                    Relayed::Close => return Err(CloseReason::ClientClosed),
                },
            }
        }
    }

    fn enqueue(&mut self, message: UpstreamMessage) -> Result<(), CloseReason> {
        let policy = self.pending.policy();
        match self.pending.push(message) {
            Enqueued::Accepted => Ok(()),
            Enqueued::Evicted(_) | Enqueued::Dropped(_) => {
                tracing::debug!(session_id = %self.id(), policy = policy.as_str(), "Pending queue full, message discarded");
                metrics::pending_overflow(policy.as_str());
                Ok(())
            }
            Enqueued::Overflow => {
                tracing::warn!(session_id = %self.id(), pending = self.pending.len(), "Pending queue full, closing session");
                metrics::pending_overflow(policy.as_str());
                Err(CloseReason::QueueOverflow)
            }
        }
    }

    /// Send queued messages upstream, oldest first.
    async fn flush_pending<K>(&mut self, upstream_tx: &mut K) -> Result<(), CloseReason>
    where
        K: Sink<UpstreamMessage> + Unpin,
    {
        let queued = self.pending.len();
        for message in self.pending.drain() {
            if upstream_tx.send(message).await.is_err() {
                return Err(CloseReason::UpstreamClosed);
            }
            metrics::message_relayed(Direction::ToUpstream.label());
        }
        if queued > 0 {
            tracing::debug!(session_id = %self.permit.id(), queued, "Flushed pending messages");
        }
        Ok(())
    }

    /// Pump both directions until one ends or shutdown is signalled.
    async fn relay<CR, CT, UR, UT, CE, UE>(
        &mut self,
        client_rx: &mut CR,
        client_tx: &mut CT,
        upstream_rx: &mut UR,
        upstream_tx: &mut UT,
    ) -> CloseReason
    where
        CR: Stream<Item = Result<ClientMessage, CE>> + Unpin,
        CT: Sink<ClientMessage> + Unpin,
        UR: Stream<Item = Result<UpstreamMessage, UE>> + Unpin,
        UT: Sink<UpstreamMessage> + Unpin,
        CE: Display,
        UE: Display,
    {
        let id = self.id();
        tokio::select! {
            reason = pump(id, client_rx, upstream_tx, from_client, Direction::ToUpstream) => reason,
            reason = pump(id, upstream_rx, client_tx, from_upstream, Direction::ToClient) => reason,
            _ = self.shutdown.recv() => CloseReason::Shutdown,
        }
    }
}

/// Copy messages from `source` to `sink` until either stops.
async fn pump<S, K, M, N, E>(
    id: SessionId,
    source: &mut S,
    sink: &mut K,
    convert: fn(M) -> Relayed<N>,
    direction: Direction,
) -> CloseReason
where
    S: Stream<Item = Result<M, E>> + Unpin,
    K: Sink<N> + Unpin,
    E: Display,
{
    while let Some(received) = source.next().await {
        let message = match received {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(session_id = %id, direction = direction.label(), error = %e, "WebSocket read failed");
                return direction.source_failed();
            }
        };
        match convert(message) {
            Relayed::Forward(message) => {
                if sink.send(message).await.is_err() {
                    return direction.sink_failed();
                }
                metrics::message_relayed(direction.label());
            }
            Relayed::Skip => {}
            Relayed::Close => return direction.source_ended(),
        }
    }
    direction.source_ended()
}

async fn close_quietly<K, M>(sink: &mut K)
where
    K: Sink<M> + Unpin,
{
    let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
}
