//! Startup settings resolved from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::{ConfigError, ProxyTarget};

/// Listen port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 1337;

/// Upstream used when `PROXY_URL` is unset.
pub const DEFAULT_UPSTREAM: &str = "http://127.0.0.1:31337";

/// Immutable process configuration, resolved once before the listener binds.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Address the proxy accepts connections on.
    pub listen_address: SocketAddr,

    /// The single upstream every request is forwarded to.
    pub target: ProxyTarget,

    /// TLS termination material paths; `None` serves plain HTTP.
    pub tls: Option<TlsSettings>,

    /// Enables the raw request/response wire dump observers.
    pub dump_traffic: bool,
}

/// Certificate and key paths for TLS termination.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl Settings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(|key| std::env::var(key).ok())
    }

    /// Resolve settings from an arbitrary lookup function.
    ///
    /// `USE_TLS` and `PROXY_DEBUG` follow the "set to anything non-empty"
    /// convention; `SSL_CERT` and `SSL_KEY` are required once `USE_TLS` is on.
    pub fn resolve<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        let listen_address = SocketAddr::from(([0, 0, 0, 0], port));

        let raw_target = lookup("PROXY_URL").unwrap_or_else(|| DEFAULT_UPSTREAM.to_string());
        let target = ProxyTarget::parse(&raw_target)?;

        let use_tls = lookup("USE_TLS").is_some_and(|v| !v.is_empty());
        let tls = if use_tls {
            let cert_path = lookup("SSL_CERT")
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingTlsMaterial("SSL_CERT"))?;
            let key_path = lookup("SSL_KEY")
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingTlsMaterial("SSL_KEY"))?;
            Some(TlsSettings {
                cert_path: PathBuf::from(cert_path),
                key_path: PathBuf::from(key_path),
            })
        } else {
            None
        };

        let dump_traffic = lookup("PROXY_DEBUG").is_some_and(|v| !v.is_empty());

        Ok(Self {
            listen_address,
            target,
            tls,
            dump_traffic,
        })
    }
}
