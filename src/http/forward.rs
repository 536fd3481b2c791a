//! Plain HTTP forwarding to the fixed upstream.

use axum::{
    body::{to_bytes, Body},
    http::{header, uri::PathAndQuery, Request, StatusCode, Uri, Version},
    response::{IntoResponse, Response},
};
use hyper::body::Incoming;

use crate::http::server::AppState;

const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Relay one request/response pair to the upstream target.
///
/// The outbound request keeps the inbound method, headers, path, query and
/// body; only the request-line scheme/authority and the `Host` header are
/// rewritten, and `X-Forwarded-Host` records the inbound `Host` when it was
/// non-empty. The response is streamed back verbatim. Upstream failure is a
/// terminal `502` for this request; there are no retries.
pub async fn forward(state: &AppState, request: Request<Body>) -> Response {
    let (mut parts, body) = request.into_parts();

    // Preserve the client's Host before it is overwritten.
    let inbound_host = parts.headers.get(header::HOST).cloned();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(state.target.scheme().clone());
    uri_parts.authority = Some(state.target.authority().clone());
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(err) => {
            tracing::error!(error = %err, "failed to rewrite request uri");
            return (StatusCode::BAD_GATEWAY, "failed to rewrite request uri").into_response();
        }
    };

    // The upstream leg negotiates its own protocol; an h2/h3 request version
    // cannot be written onto an http1 upstream connection.
    if matches!(parts.version, Version::HTTP_2 | Version::HTTP_3) {
        parts.version = Version::HTTP_11;
    }

    if let Some(host) = inbound_host.filter(|value| !value.is_empty()) {
        parts.headers.insert(X_FORWARDED_HOST, host);
    }
    parts
        .headers
        .insert(header::HOST, state.target.host_header().clone());

    let body = if state.request_observer.enabled() {
        match to_bytes(body, usize::MAX).await {
            Ok(bytes) => {
                state.request_observer.on_request(&parts, &bytes);
                Body::from(bytes)
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to read request body");
                return (StatusCode::BAD_REQUEST, "failed to read request body").into_response();
            }
        }
    } else {
        body
    };

    let outbound = Request::from_parts(parts, body);
    match state.client.request(outbound).await {
        Ok(response) => relay_response(state, response).await,
        Err(err) => {
            tracing::error!(upstream = %state.target, error = %err, "upstream request failed");
            (StatusCode::BAD_GATEWAY, "upstream request failed").into_response()
        }
    }
}

/// Hand the upstream response back to the client, streaming the body unless
/// the response observer asked for capture.
async fn relay_response(state: &AppState, response: hyper::Response<Incoming>) -> Response {
    let (parts, body) = response.into_parts();

    if state.response_observer.enabled() {
        match to_bytes(Body::new(body), usize::MAX).await {
            Ok(bytes) => {
                state.response_observer.on_response(&parts, &bytes);
                Response::from_parts(parts, Body::from(bytes)).into_response()
            }
            Err(err) => {
                tracing::error!(error = %err, "upstream response body failed mid-stream");
                (StatusCode::BAD_GATEWAY, "upstream response failed").into_response()
            }
        }
    } else {
        Response::from_parts(parts, Body::new(body)).into_response()
    }
}

