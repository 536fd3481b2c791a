//! WebSocket tunnel forwarding.
//!
//! # Responsibilities
//! - Complete the upgrade handshake with the client (any origin accepted)
//! - Establish a matching upgraded connection to the upstream
//! - Relay frames bidirectionally, one task per direction
//! - Tear down both legs as soon as either one closes or errors
//!
//! # Data Flow
//! ```text
//! Client ←──── WebSocket frames ────→ Proxy ←──── WebSocket frames ────→ Upstream
//! ```

use axum::{
    body::Body,
    extract::ws::{self, WebSocket, WebSocketUpgrade},
    extract::FromRequestParts,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_with_config,
    tungstenite::{self, client::IntoClientRequest, protocol::WebSocketConfig},
    MaybeTlsStream, WebSocketStream,
};

use crate::http::server::AppState;

/// Read/write buffer size for both legs, capping per-connection memory.
const RELAY_BUFFER_SIZE: usize = 1024;

type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open an upgraded connection to the upstream mirroring the client's
/// upgrade request, then relay frames both ways until either side closes.
///
/// The upstream is dialed before the client handshake completes, so a
/// rejected upstream handshake surfaces as a plain `502` and the client
/// connection is never left half-upgraded.
pub async fn tunnel(state: &AppState, request: Request<Body>) -> Response {
    let (mut parts, _body) = request.into_parts();

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        // Connection: Upgrade without a valid websocket handshake.
        Err(rejection) => return rejection.into_response(),
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let upstream_url = state.target.ws_url_for(path_and_query);

    // Mirror the client's upgrade request. Tungstenite generates its own
    // Sec-WebSocket-Key/Version; the negotiable and credential headers are
    // carried over as-is.
    let mut upstream_request = match upstream_url.as_str().into_client_request() {
        Ok(request) => request,
        Err(err) => {
            tracing::error!(upstream = %upstream_url, error = %err, "invalid upstream url");
            return (StatusCode::BAD_GATEWAY, "invalid upstream url").into_response();
        }
    };
    for name in [
        header::SEC_WEBSOCKET_PROTOCOL,
        header::ORIGIN,
        header::COOKIE,
        header::AUTHORIZATION,
    ] {
        if let Some(value) = parts.headers.get(&name) {
            upstream_request.headers_mut().insert(name, value.clone());
        }
    }

    let config = WebSocketConfig::default()
        .read_buffer_size(RELAY_BUFFER_SIZE)
        .write_buffer_size(RELAY_BUFFER_SIZE);

    let (upstream, handshake) =
        match connect_async_with_config(upstream_request, Some(config), false).await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::error!(
                    upstream = %upstream_url,
                    error = %err,
                    "upstream websocket handshake failed"
                );
                return (StatusCode::BAD_GATEWAY, "upstream websocket handshake failed")
                    .into_response();
            }
        };

    tracing::debug!(upstream = %upstream_url, "websocket tunnel established");

    let mut upgrade = upgrade
        .read_buffer_size(RELAY_BUFFER_SIZE)
        .write_buffer_size(RELAY_BUFFER_SIZE);

    // The client leg accepts exactly the subprotocol the upstream picked.
    let negotiated = handshake
        .headers()
        .get(header::SEC_WEBSOCKET_PROTOCOL)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    if let Some(protocol) = negotiated {
        upgrade = upgrade.protocols([protocol]);
    }

    upgrade
        .on_upgrade(move |client| relay(client, upstream))
        .into_response()
}

/// Pump frames in both directions until one leg ends, then close the other.
///
/// Each direction runs in its own task owning one read half and the opposite
/// write half, so a stall on one direction never blocks the other. The
/// select below aborts the surviving task as soon as the first finishes,
/// which drops its halves and closes both sockets.
async fn relay(client: WebSocket, upstream: UpstreamSocket) {
    let (mut upstream_tx, mut upstream_rx) = upstream.split();
    let (mut client_tx, mut client_rx) = client.split();

    let mut client_to_upstream = tokio::spawn(async move {
        while let Some(frame) = client_rx.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::debug!(error = %err, "client leg read failed");
                    break;
                }
            };
            if upstream_tx.send(into_tungstenite(frame)).await.is_err() {
                break;
            }
        }
        let _ = upstream_tx.close().await;
    });

    let mut upstream_to_client = tokio::spawn(async move {
        while let Some(frame) = upstream_rx.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::debug!(error = %err, "upstream leg read failed");
                    break;
                }
            };
            let Some(frame) = from_tungstenite(frame) else {
                continue;
            };
            if client_tx.send(frame).await.is_err() {
                break;
            }
        }
        let _ = client_tx.close().await;
    });

    tokio::select! {
        _ = &mut client_to_upstream => upstream_to_client.abort(),
        _ = &mut upstream_to_client => client_to_upstream.abort(),
    }

    tracing::debug!("websocket tunnel closed");
}

fn into_tungstenite(frame: ws::Message) -> tungstenite::Message {
    match frame {
        ws::Message::Text(text) => tungstenite::Message::Text(text.as_str().into()),
        ws::Message::Binary(data) => tungstenite::Message::Binary(data),
        ws::Message::Ping(data) => tungstenite::Message::Ping(data),
        ws::Message::Pong(data) => tungstenite::Message::Pong(data),
        ws::Message::Close(frame) => tungstenite::Message::Close(frame.map(|frame| {
            tungstenite::protocol::CloseFrame {
                code: frame.code.into(),
                reason: frame.reason.as_str().into(),
            }
        })),
    }
}

/// Returns `None` for raw frames, which tungstenite only ever surfaces when
/// frame-level reads are requested; the relay works on whole messages.
fn from_tungstenite(frame: tungstenite::Message) -> Option<ws::Message> {
    match frame {
        tungstenite::Message::Text(text) => Some(ws::Message::Text(text.as_str().into())),
        tungstenite::Message::Binary(data) => Some(ws::Message::Binary(data)),
        tungstenite::Message::Ping(data) => Some(ws::Message::Ping(data)),
        tungstenite::Message::Pong(data) => Some(ws::Message::Pong(data)),
        tungstenite::Message::Close(frame) => {
            Some(ws::Message::Close(frame.map(|frame| ws::CloseFrame {
                code: frame.code.into(),
                reason: frame.reason.as_str().into(),
            })))
        }
        tungstenite::Message::Frame(_) => None,
    }
}
