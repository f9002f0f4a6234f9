//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    // Queue metrics, recorded by reel-queue
    pub use reel_queue::{METRIC_JOBS_ENQUEUED as JOBS_ENQUEUED_TOTAL, METRIC_QUEUE_LENGTH as QUEUE_LENGTH};

    // Job outcomes
    pub const JOBS_COMPLETED_TOTAL: &str = "reel_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "reel_jobs_failed_total";
    pub const JOB_DURATION_SECONDS: &str = "reel_job_duration_seconds";
    pub const REFUNDS_TOTAL: &str = "reel_refunds_total";

    // Provider and render fallbacks
    pub use reel_ai::METRIC_PROVIDER_FALLBACKS as PROVIDER_FALLBACKS_TOTAL;
    pub use reel_media::METRIC_AUDIO_FALLBACK as COMPOSE_AUDIO_FALLBACK_TOTAL;
}

/// Install the Prometheus recorder with an HTTP scrape endpoint on `port`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {e}")))
}

/// Record a finished job.
pub fn record_job_completed(mode: &str, duration_secs: f64) {
    let labels = [("mode", mode.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a failed job.
pub fn record_job_failed(mode: &str) {
    let labels = [("mode", mode.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Outcome of a compensating refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    Refunded,
    Declined,
    Error,
}

impl RefundOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Refunded => "refunded",
            Self::Declined => "declined",
            Self::Error => "error",
        }
    }
}

/// Record a refund attempt.
pub fn record_refund(outcome: RefundOutcome) {
    counter!(names::REFUNDS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}
