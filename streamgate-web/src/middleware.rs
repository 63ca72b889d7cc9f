//! Per-client admission control and request logging.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use streamgate_core::StreamGateError;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::server::AppState;

/// Client key used when the peer address is not attached to the request.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Admits or rejects the request against the client's sliding window.
///
/// Admitted responses carry `X-Process-Time` and `X-RateLimit-Remaining`.
pub async fn admission_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = client_key(&request);

    let decision = state.admission.evaluate(&client);
    if !decision.allowed {
        debug!(%client, %path, "Request rejected by admission control");
        return ApiError::from(StreamGateError::RateLimited {
            client,
            retry_after: decision.retry_after,
        })
        .at(&path)
        .into_response();
    }

    *state.request_counts.entry(path.clone()).or_insert(0) += 1;

    let mut response = next.run(request).await;
    let elapsed = started.elapsed().as_secs_f64();

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed:.6}")) {
        headers.insert("X-Process-Time", value);
    }
    headers.insert(
        "X-RateLimit-Remaining",
        HeaderValue::from(decision.remaining),
    );

    info!(
        "{method} {path} - {} - {elapsed:.3}s",
        response.status().as_u16()
    );
    response
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
