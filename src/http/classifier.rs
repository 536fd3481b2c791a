//! Per-request protocol classification.

use axum::http::{header, HeaderMap};

/// How an inbound request is to be forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Ordinary request/response round-trip.
    PlainHttp,
    /// Connection-level upgrade; tunnel as a WebSocket session.
    WebSocketUpgrade,
}

/// Classify a request from its headers alone.
///
/// A request is a [`RequestKind::WebSocketUpgrade`] iff its `Connection`
/// header equals `Upgrade` (header values are compared case-insensitively).
/// No other heuristics; a missing header means plain HTTP.
pub fn classify(headers: &HeaderMap) -> RequestKind {
    let upgrade_requested = headers
        .get(header::CONNECTION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("upgrade"));

    if upgrade_requested {
        RequestKind::WebSocketUpgrade
    } else {
        RequestKind::PlainHttp
    }
}
