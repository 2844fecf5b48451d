use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Status family label; individual codes add little for a handful of routes.
fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Counts, times and tracks in-flight DTR API calls per route template.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let route = match request.extensions().get::<MatchedPath>() {
        Some(path) => path.as_str().to_string(),
        None => "unmatched".to_string(),
    };
    let method = request.method().as_str().to_string();

    let in_flight = gauge!("dtr_http_requests_in_flight", "route" => route.clone());
    in_flight.increment(1.0);
    let started = Instant::now();

    let response = next.run(request).await;

    in_flight.decrement(1.0);
    let status = response.status().as_u16();

    counter!(
        "dtr_http_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status_class(status)
    )
    .increment(1);

    if status >= 500 {
        tracing::warn!(route, status, "DTR request failed");
    }

    histogram!("dtr_http_request_duration_seconds", "method" => method, "route" => route)
        .record(started.elapsed().as_secs_f64());

    response
}
