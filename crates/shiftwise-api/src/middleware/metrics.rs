//! # Prometheus Metrics
//!
//! Request counters recorded through the `metrics` facade. With no recorder
//! installed (tests, `SHIFTWISE_METRICS_ENABLED=false`) they are no-ops.

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;

/// Counts every request by method, matched route and status class.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_owned();
    // The route template keeps label cardinality bounded.
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let response = next.run(request).await;

    let status = response.status();
    metrics::counter!(
        "shiftwise_http_requests_total",
        "method" => method,
        "route" => route,
        "status" => status_class(status.as_u16()),
    )
    .increment(1);

    response
}

fn status_class(code: u16) -> &'static str {
    match code {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}
