//! Admission control for WebSocket sessions.
//!
//! # Responsibilities
//! - Generate unique session IDs for tracing
//! - Enforce `websocket.max_sessions` via semaphore
//! - Release the slot when the session ends, even on panic

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// Global atomic counter for session IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a WebSocket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

/// Counting gate in front of session creation.
///
/// Unlike a listener backlog this never waits: a full gate refuses the upgrade.
#[derive(Debug, Clone)]
pub struct SessionGate {
    slots: Arc<Semaphore>,
    max_sessions: usize,
}

impl SessionGate {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_sessions)),
            max_sessions,
        }
    }

    /// Take a slot if one is free.
    pub fn try_admit(&self) -> Option<SessionPermit> {
        let permit = self.slots.clone().try_acquire_owned().ok()?;
        let id = SessionId::new();
        metrics::session_admitted();
        tracing::trace!(session_id = %id, available = self.slots.available_permits(), "Session admitted");
        Some(SessionPermit { _permit: permit, id })
    }

    pub fn active_sessions(&self) -> usize {
        self.max_sessions - self.slots.available_permits()
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }
}

/// A slot held for the lifetime of one session.
#[derive(Debug)]
pub struct SessionPermit {
    _permit: OwnedSemaphorePermit,
    id: SessionId,
}

impl SessionPermit {
    pub fn id(&self) -> SessionId {
        self.id
    }
}

impl Drop for SessionPermit {
    fn drop(&mut self) {
        metrics::session_released();
        tracing::trace!(session_id = %self.id, "Session slot released");
    }
}
