//! Structured job logging.
//!
//! Every line carries the job ID and the operation so a single job can
//! be followed through the pipeline in aggregated logs.

use tracing::{error, info, info_span, warn, Span};
use reel_models::JobId;

/// Operation name for a prompt-to-video run.
pub const GENERATE_VIDEO: &str = "generate_video";

/// Per-job logger with consistent fields.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// Log a stage transition with the advisory progress value.
    pub fn log_progress(&self, progress: u8, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            progress,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    /// Span covering the whole job.
    pub fn create_span(&self) -> Span {
        info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
