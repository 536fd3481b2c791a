//! Server shell: router setup and per-request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with the single catch-all route
//! - Share the upstream client, target, and observers with handlers
//! - Classify every inbound request and hand it to a forwarder
//! - Bind plain or TLS-terminated listeners

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{ProxyTarget, Settings};
use crate::http::classifier::{classify, RequestKind};
use crate::http::observe::{NoopObserver, RequestObserver, ResponseObserver, WireDump};
use crate::http::{forward, websocket};

/// Shared upstream HTTP client; dials plain TCP or TLS per the target's scheme.
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Application state injected into the dispatch handler.
///
/// Everything here is read-only after startup; no state crosses between
/// concurrent requests.
#[derive(Clone)]
pub struct AppState {
    pub client: HttpClient,
    pub target: Arc<ProxyTarget>,
    pub request_observer: Arc<dyn RequestObserver>,
    pub response_observer: Arc<dyn ResponseObserver>,
}

/// HTTP server for the reverse proxy.
pub struct ProxyServer {
    router: Router,
    settings: Settings,
}

impl ProxyServer {
    /// Create a new proxy server with the given settings.
    ///
    /// Fails only when the system root certificate store cannot be loaded,
    /// which is a fatal startup condition.
    pub fn new(settings: Settings) -> Result<Self, std::io::Error> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let (request_observer, response_observer): (
            Arc<dyn RequestObserver>,
            Arc<dyn ResponseObserver>,
        ) = if settings.dump_traffic {
            (Arc::new(WireDump), Arc::new(WireDump))
        } else {
            (Arc::new(NoopObserver), Arc::new(NoopObserver))
        };

        let state = AppState {
            client,
            target: Arc::new(settings.target.clone()),
            request_observer,
            response_observer,
        };

        let router = Self::build_router(state);
        Ok(Self { router, settings })
    }

    /// Build the Axum router: exactly one handler for every path and method.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch))
            .route("/", any(dispatch))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting plain HTTP connections on the listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.settings.target,
            "proxy listening"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("proxy stopped");
        Ok(())
    }

    /// Run the server with TLS termination using preloaded material.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            address = %addr,
            upstream = %self.settings.target,
            "proxy listening with TLS"
        );

        // Same drain behavior as the plain path, through axum-server's handle.
        let handle = axum_server::Handle::new();
        let watcher = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            watcher.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("proxy stopped");
        Ok(())
    }
}

/// Single-route dispatcher: classify the request, then forward or tunnel.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    tracing::info!(
        origin = %state.target,
        path = %request.uri(),
        "proxying request"
    );

    match classify(request.headers()) {
        RequestKind::WebSocketUpgrade => websocket::tunnel(&state, request).await,
        RequestKind::PlainHttp => forward::forward(&state, request).await,
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
