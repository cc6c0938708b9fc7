//! Middleware for the toolgate server.

use std::time::Instant;

use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn};

/// Request logging middleware.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Request: {} {}", method, path);

    let response = next.run(req).await;
    let duration = start.elapsed();
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        warn!(
            "Request failed: {} {} - {} ({:?})",
            method, path, status, duration
        );
    } else {
        info!(
            "Request completed: {} {} - {} ({:?})",
            method, path, status, duration
        );
    }

    response
}
