//! Prometheus metrics for Stratum.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `stratum_requests_total` | Counter | `method`, `status` | Total requests |
//! | `stratum_request_duration_seconds` | Histogram | `method` | Request latency |
//!
//! The recorder is process-global. [`install_prometheus`] installs it once
//! and hands out the same [`PrometheusHandle`] on every later call, so
//! several services in one process share a registry.
//!
//! # Example
//!
//! ```rust,ignore
//! use stratum_telemetry::metrics::{install_prometheus, record_request};
//!
//! let handle = install_prometheus()?;
//! record_request("GET", 200, Duration::from_millis(45));
//! println!("{}", handle.render());
//! ```

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Total requests counter.
pub const REQUESTS_TOTAL: &str = "stratum_requests_total";

/// Request duration histogram.
pub const REQUEST_DURATION_SECONDS: &str = "stratum_request_duration_seconds";

/// Default duration buckets: 1ms to 10s.
pub const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder and returns its handle.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if another recorder is already
/// installed in the process.
pub fn install_prometheus() -> TelemetryResult<PrometheusHandle> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    register_metric_descriptions();

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

/// Returns the installed handle, if any.
pub fn metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests processed");
    describe_histogram!(REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
}

/// Records a completed request.
pub fn record_request(method: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION_SECONDS, "method" => method.to_string())
        .record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_request("GET", 200, Duration::from_millis(3));
    }

    #[test]
    fn test_install_is_idempotent() {
        let first = install_prometheus().unwrap();
        let second = install_prometheus().unwrap();
        record_request("GET", 200, Duration::from_millis(3));

        let rendered = second.render();
        assert!(rendered.contains(REQUESTS_TOTAL));
        assert!(first.render().contains(REQUESTS_TOTAL));
        assert!(render_metrics().is_some());
    }
}
