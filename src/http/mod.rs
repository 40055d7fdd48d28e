//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, classification)
//!     → plain HTTP:
//!         forward.rs (build upstream request, stream response)
//!             request.rs (strip connection-scoped headers, set Host)
//!             response.rs (strip encoding headers, add CORS, 502 on failure)
//!     → Upgrade: websocket:
//!         websocket/ (handshake, upstream dial, buffered bidirectional relay)
//! ```

pub mod forward;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use forward::HttpRelay;
pub use server::HttpServer;
pub use websocket::WebSocketRelay;
