//! Prometheus recorder, HTTP request metrics and the scrape endpoint.

use crate::state::AppState;
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use memora_core::{MemoraError, MemoraResult};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Metric names for HTTP traffic.
pub mod names {
    /// Total requests by method, endpoint and status code.
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    /// Request latency in seconds.
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
    /// Requests currently being served.
    pub const HTTP_REQUESTS_IN_PROGRESS: &str = "http_requests_in_progress";
    /// Requests answered with a 5xx status.
    pub const HTTP_SERVER_ERRORS_TOTAL: &str = "http_server_errors_total";
}

/// Latency histogram buckets in seconds.
const DURATION_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Label used when a request matched no route.
const UNMATCHED: &str = "unmatched";

static RECORDER: OnceLock<Result<PrometheusHandle, String>> = OnceLock::new();

/// Register all metric descriptions, HTTP and cache.
pub fn register_metrics() {
    describe_counter!(
        names::HTTP_REQUESTS_TOTAL,
        "Total number of HTTP requests"
    );
    describe_histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request latency in seconds"
    );
    describe_gauge!(
        names::HTTP_REQUESTS_IN_PROGRESS,
        "Number of HTTP requests in progress"
    );
    describe_counter!(
        names::HTTP_SERVER_ERRORS_TOTAL,
        "Total number of HTTP requests answered with a server error"
    );
    memora_cache::register_metrics();
}

/// Installs the global Prometheus recorder.
///
/// Only the first call installs; later calls return the same handle.
pub fn install_recorder() -> MemoraResult<PrometheusHandle> {
    RECORDER
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .set_buckets_for_metric(
                    Matcher::Full(names::HTTP_REQUEST_DURATION_SECONDS.to_string()),
                    DURATION_BUCKETS,
                )
                .map_err(|e| e.to_string())?
                .install_recorder()
                .map_err(|e| e.to_string())?;
            register_metrics();
            Ok(handle)
        })
        .clone()
        .map_err(|e| MemoraError::Configuration(format!("Failed to install metrics recorder: {e}")))
}

/// Paths the HTTP metrics middleware does not record.
#[derive(Debug, Clone, Default)]
pub struct HttpMetrics {
    exclude_paths: Arc<[String]>,
}

impl HttpMetrics {
    /// Creates the middleware state.
    #[must_use]
    pub fn new(exclude_paths: &[String]) -> Self {
        Self {
            exclude_paths: exclude_paths.into(),
        }
    }

    /// Whether requests to `path` go unrecorded.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude_paths.iter().any(|p| p == path)
    }
}

/// Records count, latency and in-flight requests per route template.
pub async fn http_metrics_middleware(
    State(metrics): State<HttpMetrics>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if metrics.is_excluded(request.uri().path()) {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED.to_string(), |p| p.as_str().to_owned());

    let in_progress = gauge!(
        names::HTTP_REQUESTS_IN_PROGRESS,
        "method" => method.clone(),
        "endpoint" => endpoint.clone()
    );
    in_progress.increment(1.0);
    let start = Instant::now();

    let response = next.run(request).await;

    in_progress.decrement(1.0);
    let status = response.status();

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "endpoint" => endpoint.clone(),
        "status_code" => status.as_u16().to_string()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.clone(),
        "endpoint" => endpoint.clone()
    )
    .record(start.elapsed().as_secs_f64());

    if status.is_server_error() {
        counter!(
            names::HTTP_SERVER_ERRORS_TOTAL,
            "method" => method,
            "endpoint" => endpoint,
            "status_code" => status.as_u16().to_string()
        )
        .increment(1);
    }

    response
}

/// Serves the Prometheus text exposition format.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
