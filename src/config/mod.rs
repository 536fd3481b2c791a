//! Configuration resolution subsystem.
//!
//! # Data Flow
//! ```text
//! process environment (+ optional .env file)
//!     → settings.rs (resolve PORT / PROXY_URL / USE_TLS / SSL_CERT / SSL_KEY)
//!     → target.rs (parse & validate the upstream URL)
//!     → Settings (validated, immutable)
//!     → shared with the server shell and forwarders
//! ```
//!
//! # Design Decisions
//! - Configuration is resolved exactly once, before the listener binds; there
//!   are no mutable process-wide settings.
//! - Resolution is a pure function over a lookup closure so tests can feed
//!   fixed maps instead of mutating the process environment.
//! - The upstream target must be a fully-qualified http/https URL; a bare
//!   host:port is rejected at startup rather than patched up with a guessed
//!   scheme.

pub mod settings;
pub mod target;

pub use settings::{Settings, TlsSettings};
pub use target::ProxyTarget;

use thiserror::Error;

/// Error type for startup configuration resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid PORT value {0:?}")]
    InvalidPort(String),

    #[error("invalid upstream target {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("USE_TLS is set but {0} is not")]
    MissingTlsMaterial(&'static str),
}
