//! Upstream target parsing and validation.

use axum::http::header::HeaderValue;
use axum::http::uri::{Authority, Scheme};
use std::str::FromStr;
use url::Url;

use crate::config::ConfigError;

/// The fixed upstream every request is forwarded to.
///
/// Parsed and validated once at startup, then shared read-only with every
/// request handler. Holds the pre-built URI components so the per-request
/// rewrite is a couple of clones.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    url: Url,
    scheme: Scheme,
    authority: Authority,
    host_header: HeaderValue,
}

impl ProxyTarget {
    /// Parse a fully-qualified http/https URL into a target.
    ///
    /// Rejects scheme-less input (`127.0.0.1:31337`), non-http(s) schemes,
    /// and URLs without a host.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTarget {
            url: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(invalid(format!("unsupported scheme {other:?}"))),
        };

        let host = url
            .host_str()
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let authority_str = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority_str)
            .map_err(|e| invalid(e.to_string()))?;
        let host_header = HeaderValue::from_str(&authority_str)
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            url,
            scheme,
            authority,
            host_header,
        })
    }

    /// URI scheme for outbound plain-HTTP requests.
    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// `host[:port]` authority for outbound requests.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Value for the rewritten outbound `Host` header.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_header
    }

    /// Upstream WebSocket URL for the given path and query, with the target
    /// scheme mapped `http → ws` / `https → wss`.
    pub fn ws_url_for(&self, path_and_query: &str) -> String {
        let scheme = if self.scheme == Scheme::HTTPS { "wss" } else { "ws" };
        format!("{scheme}://{}{path_and_query}", self.authority)
    }
}

impl std::fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}
