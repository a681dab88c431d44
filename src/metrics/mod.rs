use crate::error::{ApiError, Result};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Create a new metrics service
    ///
    /// Installs the process-wide recorder; call once at startup.
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            ApiError::Internal(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        describe_counter!(
            "api_requests_total",
            "Total number of HTTP requests received"
        );
        describe_histogram!(
            "api_request_duration_seconds",
            "HTTP request latencies in seconds"
        );
        describe_counter!(
            "api_requests_errors_total",
            "Total number of HTTP requests that resulted in errors"
        );

        describe_counter!(
            "api_auth_attempts_total",
            "Total number of authentication attempts"
        );
        describe_counter!(
            "api_auth_failures_total",
            "Total number of authentication failures"
        );

        describe_counter!(
            "api_rate_limit_exceeded_total",
            "Total number of requests rejected due to rate limiting"
        );

        describe_counter!(
            "api_report_requests_total",
            "Total number of requests sent to the report backend"
        );
        describe_histogram!(
            "api_report_duration_seconds",
            "Report backend latencies in seconds"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Timer for measuring request duration, recorded on completion
pub struct Timer {
    start: Instant,
    method: String,
    path: String,
}

impl Timer {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            start: Instant::now(),
            method: method.to_string(),
            path: path.to_string(),
        }
    }

    pub fn record(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();
        record_request(&self.method, &self.path, status, duration);
    }
}

/// Record a request metric
pub fn record_request(method: &str, path: &str, status: u16, duration: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!("api_requests_total", &labels).increment(1);
    histogram!("api_request_duration_seconds", &labels).record(duration);

    if status >= 400 {
        counter!("api_requests_errors_total", &labels).increment(1);
    }
}

/// Record an authentication attempt
pub fn record_auth_attempt(method: &str, success: bool) {
    let labels = [("method", method.to_string())];
    counter!("api_auth_attempts_total", &labels).increment(1);

    if !success {
        counter!("api_auth_failures_total", &labels).increment(1);
    }
}

/// Record a request rejected by the rate limiter
pub fn record_rate_limit_exceeded(identity: &str) {
    let labels = [("identity", identity.to_string())];
    counter!("api_rate_limit_exceeded_total", &labels).increment(1);
}

/// Record a report backend call
pub fn record_report_request(outcome: &str, duration: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!("api_report_requests_total", &labels).increment(1);
    histogram!("api_report_duration_seconds", &labels).record(duration);
}
