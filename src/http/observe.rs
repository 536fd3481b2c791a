//! Request/response observation hooks.
//!
//! The forwarder invokes one [`RequestObserver`] before dispatching upstream
//! and one [`ResponseObserver`] after the upstream answers. The default
//! no-op observers keep bodies streaming; the wire-dump observers (enabled
//! via `PROXY_DEBUG`) capture head and body for logging without altering the
//! relayed bytes.

use axum::body::Bytes;
use axum::http::{request, response, HeaderMap};

/// Hook invoked with the outbound request just before dispatch.
pub trait RequestObserver: Send + Sync {
    /// When true, the forwarder captures the full request body so that
    /// [`RequestObserver::on_request`] sees it. Costs a buffering pass.
    fn enabled(&self) -> bool {
        false
    }

    fn on_request(&self, head: &request::Parts, body: &Bytes) {
        let _ = (head, body);
    }
}

/// Hook invoked with the upstream response before it is relayed back.
pub trait ResponseObserver: Send + Sync {
    /// When true, the forwarder captures the full response body so that
    /// [`ResponseObserver::on_response`] sees it.
    fn enabled(&self) -> bool {
        false
    }

    fn on_response(&self, head: &response::Parts, body: &Bytes) {
        let _ = (head, body);
    }
}

/// Default observer; relaying stays fully streaming.
pub struct NoopObserver;

impl RequestObserver for NoopObserver {}
impl ResponseObserver for NoopObserver {}

/// Diagnostic observer logging raw request/response dumps between explicit
/// begin/end markers at debug level.
pub struct WireDump;

impl RequestObserver for WireDump {
    fn enabled(&self) -> bool {
        true
    }

    fn on_request(&self, head: &request::Parts, body: &Bytes) {
        tracing::debug!("---- request dump begin ----");
        tracing::debug!(
            "{} {} {:?}\n{}{}",
            head.method,
            head.uri,
            head.version,
            render_headers(&head.headers),
            render_body(body),
        );
        tracing::debug!("---- request dump end ----");
    }
}

impl ResponseObserver for WireDump {
    fn enabled(&self) -> bool {
        true
    }

    fn on_response(&self, head: &response::Parts, body: &Bytes) {
        tracing::debug!("---- response dump begin ----");
        tracing::debug!(
            "{:?} {}\n{}{}",
            head.version,
            head.status,
            render_headers(&head.headers),
            render_body(body),
        );
        tracing::debug!("---- response dump end ----");
    }
}

fn render_headers(headers: &HeaderMap) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for (name, value) in headers {
        let _ = writeln!(out, "{name}: {}", String::from_utf8_lossy(value.as_bytes()));
    }
    out
}

fn render_body(body: &Bytes) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!("\n{}", String::from_utf8_lossy(body))
    }
}
