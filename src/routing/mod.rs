//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → classifier.rs (Upgrade: websocket?)
//!         yes → WebSocket relay
//!         no  → HTTP relay
//!     → target.rs (rewrite scheme + host, keep path and query)
//! ```
//!
//! # Design Decisions
//! - One fixed upstream, no route table
//! - Classification looks at headers only, never the body

pub mod classifier;
pub mod target;

pub use classifier::{classify, is_websocket_upgrade, RequestKind};
pub use target::UpstreamTarget;
