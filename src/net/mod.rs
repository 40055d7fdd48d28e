//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, plain TCP)
//!     → tls.rs (optional TLS via axum-server/rustls)
//!     → Hand off to HTTP layer
//!
//! WebSocket upgrade
//!     → admission.rs (session slot or 503)
//!     → session owns the slot until closed
//! ```
//!
//! # Design Decisions
//! - TLS is optional and handled transparently by the transport
//! - Session admission never blocks; a full gate refuses immediately

pub mod admission;
pub mod listener;
pub mod tls;
