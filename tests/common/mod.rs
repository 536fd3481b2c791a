//! Shared utilities for integration tests: mock upstreams and raw clients.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::any,
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use onehop::config::{ProxyTarget, Settings};
use onehop::http::ProxyServer;

/// Start the proxy on `listen`, forwarding to `upstream`, in the background.
pub async fn start_proxy(listen: SocketAddr, upstream: &str) {
    start_proxy_inner(listen, upstream, false).await;
}

/// Start the proxy with the wire-dump observers enabled.
pub async fn start_dumping_proxy(listen: SocketAddr, upstream: &str) {
    start_proxy_inner(listen, upstream, true).await;
}

async fn start_proxy_inner(listen: SocketAddr, upstream: &str, dump_traffic: bool) {
    let settings = Settings {
        listen_address: listen,
        target: ProxyTarget::parse(upstream).expect("valid upstream url"),
        tls: None,
        dump_traffic,
    };
    let server = ProxyServer::new(settings).expect("proxy server");
    let listener = TcpListener::bind(listen).await.unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
}

/// Start a mock upstream that answers every request with a fixed body.
pub async fn start_mock_upstream(addr: SocketAddr, body: &'static str) {
    start_bulk_upstream(addr, body.as_bytes().to_vec()).await;
}

/// Start a mock upstream that answers every request with the given bytes.
pub async fn start_bulk_upstream(addr: SocketAddr, body: Vec<u8>) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let body = body.clone();
            tokio::spawn(async move {
                let _ = read_request_head(&mut socket).await;
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
            });
        }
    });
}

/// Start a mock upstream that echoes the `Host` and `X-Forwarded-Host`
/// headers it received, so tests can assert on the proxy's rewrites.
pub async fn start_header_echo_upstream(addr: SocketAddr) {
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let head = read_request_head(&mut socket).await;
                let host = header_value(&head, "host").unwrap_or_else(|| "<none>".into());
                let forwarded =
                    header_value(&head, "x-forwarded-host").unwrap_or_else(|| "<none>".into());
                let body = format!("host={host}\nx-forwarded-host={forwarded}\n");
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });
}

/// Start an upstream that counts accepted TCP connections and drops them
/// immediately, so tests can observe whether a dial ever happened.
pub async fn start_counting_upstream(addr: SocketAddr) -> Arc<AtomicUsize> {
    let accepted = Arc::new(AtomicUsize::new(0));
    let listener = TcpListener::bind(addr).await.unwrap();

    let counter = accepted.clone();
    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });

    accepted
}

/// Start a WebSocket echo upstream. Returns a receiver that yields once per
/// upstream connection that has fully closed.
pub async fn start_ws_echo_upstream(addr: SocketAddr) -> mpsc::UnboundedReceiver<()> {
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    let app = Router::new()
        .route("/", any(ws_echo))
        .route("/{*path}", any(ws_echo))
        .with_state(closed_tx);
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    closed_rx
}

/// Start a WebSocket echo upstream that offers the given subprotocol during
/// the handshake. Returns the per-connection close-signal receiver.
pub async fn start_ws_protocol_echo_upstream(
    addr: SocketAddr,
    protocol: &'static str,
) -> mpsc::UnboundedReceiver<()> {
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    let app = Router::new()
        .route("/", any(ws_protocol_echo))
        .route("/{*path}", any(ws_protocol_echo))
        .with_state((closed_tx, protocol));
    let listener = TcpListener::bind(addr).await.unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    closed_rx
}

async fn ws_echo(
    State(closed): State<mpsc::UnboundedSender<()>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| echo_until_closed(socket, closed))
}

async fn ws_protocol_echo(
    State((closed, protocol)): State<(mpsc::UnboundedSender<()>, &'static str)>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade
        .protocols([protocol])
        .on_upgrade(move |socket| echo_until_closed(socket, closed))
}

async fn echo_until_closed(mut socket: axum::extract::ws::WebSocket, closed: mpsc::UnboundedSender<()>) {
    while let Some(Ok(frame)) = socket.recv().await {
        if socket.send(frame).await.is_err() {
            break;
        }
    }
    let _ = closed.send(());
}

/// Issue a raw HTTP/1.1 GET with an explicit `Host` header and return the
/// full response (head + body) as text.
pub async fn raw_http_get(addr: SocketAddr, path: &str, host: &str) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    socket.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

async fn read_request_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                head.extend_from_slice(&chunk[..n]);
                if head.windows(4).any(|window| window == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}

fn header_value(head: &str, name: &str) -> Option<String> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}
