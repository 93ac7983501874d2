//! Request logging middleware.
//!
//! Logs every API request with method, path, status code and handler time.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Paths polled by probes and scrapers; logged at DEBUG only
const QUIET_PATHS: [&str; 2] = ["/health", "/metrics"];

/// Logs at INFO for successful requests, WARN for 5xx.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let quiet = QUIET_PATHS.contains(&path.as_str());

    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if status >= 500 {
        warn!(
            method = %method,
            path = %path,
            status,
            latency_ms = elapsed_ms,
            "Request failed (5xx)"
        );
    } else if quiet {
        debug!(
            method = %method,
            path = %path,
            status,
            latency_ms = elapsed_ms,
            "Request completed"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status,
            latency_ms = elapsed_ms,
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_passes_response_through() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(middleware::from_fn(request_logging));

        let response = app
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_keeps_404() {
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(middleware::from_fn(request_logging));

        let response = app
            .oneshot(Request::builder().uri("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
