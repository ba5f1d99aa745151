use std::time::Instant;

use tracing::{info, warn};

use super::Next;
use crate::request::Request;
use crate::response::Response;

/// Logs one event per request with method, path, status, and latency.
///
/// Server errors are logged at `WARN`, everything else at `INFO`.
///
/// ```rust
/// let mut server = apiserve::Server::new();
/// server.add_middleware(apiserve::middleware::trace);
/// ```
pub async fn trace(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.path().to_owned();
    let started = Instant::now();

    let res = next.run(req).await;

    let status = res.status_code().as_u16();
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    if res.status_code().is_server_error() {
        warn!(%method, %path, status, latency_ms, "request failed");
    } else {
        info!(%method, %path, status, latency_ms, "request");
    }
    res
}
