//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting, drains HTTP
//!             → every WebSocket session closes both ends
//! ```
//!
//! # Design Decisions
//! - Watch channel rather than broadcast: late subscribers still see the trigger
//! - Triggering is idempotent

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
