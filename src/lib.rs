//! Transparent single-upstream HTTP/WebSocket reverse proxy.
//!
//! Every inbound request is forwarded to one fixed upstream target. Plain
//! HTTP requests are relayed as streaming request/response pairs; requests
//! carrying a `Connection: Upgrade` header are tunneled as WebSocket
//! sessions with frames relayed in both directions until either side closes.
//!
//! # Data Flow
//! ```text
//! Client connection (TCP or TLS)
//!     → http::server (single catch-all route)
//!     → http::classifier (PlainHttp | WebSocketUpgrade)
//!     → http::forward   (rewrite host/scheme, stream round-trip)
//!       or http::websocket (upgrade both legs, bidirectional relay)
//!     → Response / frames back to client
//! ```

pub mod config;
pub mod http;
pub mod net;

pub use config::{ProxyTarget, Settings};
pub use http::ProxyServer;
