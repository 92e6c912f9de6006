//! Per-request access log.

use std::time::Instant;

use tracing::info;

use super::Next;
use crate::request::Request;
use crate::response::Response;

/// Logs one `info` event per request with method, path, status and latency.
///
/// Register it first so the latency covers the whole pipeline.
pub async fn trace(req: Request, next: Next) -> Response {
    let method = req.method();
    let path = req.path().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    info!(
        %method,
        path = %path,
        status = response.status_code(),
        latency_ms = started.elapsed().as_secs_f64() * 1000.0,
        "request"
    );
    response
}
