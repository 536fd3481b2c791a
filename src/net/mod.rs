//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! startup
//!     → tls.rs (load certificate + key into a rustls config, fatal on error)
//!     → listener bound by main (plain TCP or TLS-wrapped)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS material is loaded exactly once; handshakes share the same config.
//! - A missing certificate or key is a startup failure, never a per-request
//!   condition.

pub mod tls;
