//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, single catch-all route)
//!     → classifier.rs (PlainHttp | WebSocketUpgrade)
//!     → forward.rs (plain round-trip, streamed)
//!       or websocket.rs (upgrade both legs, bidirectional relay)
//!     → Send to client
//! ```

pub mod classifier;
pub mod forward;
pub mod observe;
pub mod server;
pub mod websocket;

pub use classifier::{classify, RequestKind};
pub use server::{AppState, ProxyServer};
