//! Request dispatch metrics.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `trellis_requests_total` | Counter | `outcome` | Dispatches by terminal outcome (`committed`, `failed`) |
//! | `trellis_request_timeouts_total` | Counter | - | Suspended requests whose timeout fired |
//! | `trellis_request_duration_seconds` | Histogram | `outcome` | Time from dispatch to terminal outcome |
//!
//! Recording is a no-op until a recorder is installed, e.g. with
//! [`install_prometheus_recorder`].

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

/// Requests counter name.
pub const REQUESTS_TOTAL: &str = "trellis_requests_total";
/// Timeouts counter name.
pub const REQUEST_TIMEOUTS_TOTAL: &str = "trellis_request_timeouts_total";
/// Duration histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "trellis_request_duration_seconds";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Terminal outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The response was committed.
    Committed,
    /// The exchange failed.
    Failed,
}

impl Outcome {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }
}

/// Installs a Prometheus recorder serving `/metrics` on `addr`.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if a recorder is already installed or the
/// listener cannot start.
pub fn install_prometheus_recorder(addr: &str) -> TelemetryResult<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{addr}: {e}")))?;

    let handle = PrometheusBuilder::new()
        .with_http_listener(addr)
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    describe_metrics();
    Ok(())
}

/// Renders metrics in Prometheus text format, if a recorder is installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Requests dispatched, by terminal outcome");
    describe_counter!(
        REQUEST_TIMEOUTS_TOTAL,
        "Suspended requests whose timeout elapsed before resumption"
    );
    describe_histogram!(
        REQUEST_DURATION_SECONDS,
        "Time from dispatch to commit or failure in seconds"
    );
}

/// Records a terminal dispatch outcome.
pub fn record_dispatch(outcome: Outcome, duration: Duration) {
    counter!(REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    histogram!(REQUEST_DURATION_SECONDS, "outcome" => outcome.as_str())
        .record(duration.as_secs_f64());
}

/// Records a fired suspend timeout.
pub fn record_timeout() {
    counter!(REQUEST_TIMEOUTS_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::Committed.as_str(), "committed");
        assert_eq!(Outcome::Failed.as_str(), "failed");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_dispatch(Outcome::Committed, Duration::from_millis(3));
        record_timeout();
        assert!(render_metrics().is_none());
    }

    #[test]
    fn test_invalid_address() {
        let err = install_prometheus_recorder("not an address").unwrap_err();
        assert!(matches!(err, TelemetryError::InvalidAddress(_)));
    }
}
